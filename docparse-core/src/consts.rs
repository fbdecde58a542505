/// Render resolution used when the caller does not pick one.
pub const DEFAULT_DPI: u32 = 224;

/// PDF user space unit: 1pt = 1/72in.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Side length of the square model input.
///
/// Pages are letterboxed into an `INPUT_SIZE` x `INPUT_SIZE` canvas before
/// inference, so the model always sees the same tensor shape.
pub const INPUT_SIZE: usize = 1024;

/// Number of color channels in the input tensor (RGB).
pub const INPUT_CHANNELS: usize = 3;

/// Batch size for model inference. One page per forward pass.
pub const BATCH_SIZE: usize = 1;

/// Constant used to pad the letterboxed image on the bottom and right edges.
pub const PAD_VALUE: u8 = 114;

/// Minimum confidence a detection needs to survive filtering.
///
/// The comparison is strict: a detection scoring exactly the threshold is dropped.
pub const SCORE_THRESHOLD: f32 = 0.3;

/// IoU threshold for Non-Maximum Suppression (NMS).
///
/// When two boxes overlap with an IoU greater than this value, the one with
/// the lower score is suppressed.
pub const NMS_IOU_THRESHOLD: f32 = 0.45;

/// Input name the layout model binds its image tensor to.
pub const MODEL_INPUT_NAME: &str = "images";

/// Default location of the layout model.
pub const DEFAULT_MODEL_PATH: &str = "models/yolov8s-doclaynet.onnx";

/// Values per row of an end-to-end detection output: x1, y1, x2, y2, score, class.
pub const DETECTION_ROW_SIZE: usize = 6;

/// Number of box values in a raw YOLO head output (center x, center y, width, height).
pub const CXYWH_OFFSET: usize = 4;

/// Environment variable pointing at the directory holding the pdfium library.
pub const PDFIUM_LIB_PATH_ENV_NAME: &str = "PDFIUM_DYNAMIC_LIB_PATH";

/// Thickness in pixels of the rectangles drawn on annotated pages.
pub const ANNOTATION_THICKNESS: i32 = 3;
