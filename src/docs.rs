use crate::modules::video::dto::{GenerateVideoRequest, GenerateVideoResponse, VideoResponse};
use crate::pipeline::job::VideoStyle;
use crate::pipeline::status::JobStatus;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::video::handler::generate_video,
        crate::modules::video::handler::get_status,
        crate::modules::video::handler::get_feed,
    ),
    components(
        schemas(
            GenerateVideoRequest, GenerateVideoResponse, VideoResponse,
            VideoStyle, JobStatus,
        )
    ),
    tags(
        (name = "Videos", description = "Narrated slideshow video generation")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_video_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();
        assert!(paths.contains(&"/api/v1/generate".to_string()));
        assert!(paths.contains(&"/api/v1/status/{id}".to_string()));
        assert!(paths.contains(&"/api/v1/feed".to_string()));
    }
}
