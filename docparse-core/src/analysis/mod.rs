pub mod bbox;
pub mod labels;
pub mod letterbox;
pub mod nms;
pub mod postprocess;
