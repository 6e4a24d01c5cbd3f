pub mod ai;
pub mod db;
pub mod ffmpeg;
pub mod queue;
pub mod storage;
