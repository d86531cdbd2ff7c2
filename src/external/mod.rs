pub mod video_provider;
pub mod youtube;
