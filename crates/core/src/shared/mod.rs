pub mod constants;
pub mod crop_rect;
pub mod export_name;
pub mod frame;
pub mod video_metadata;
