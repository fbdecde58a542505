use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use derive_builder::Builder;
use ndarray::Array4;
use snafu::ResultExt;
use tokio::{sync::Mutex, task};
use tracing::*;

use crate::{
    analysis::{
        labels::LabelMap,
        letterbox::{ChannelOrder, letterbox},
        nms::NmsPolicy,
        postprocess::{PostprocessConfig, postprocess},
    },
    consts::{DEFAULT_DPI, INPUT_SIZE, NMS_IOU_THRESHOLD, SCORE_THRESHOLD},
    error::{DocparseError, InferenceTaskSnafu, InferenceTimeoutSnafu, RenderTaskSnafu},
    inference::LayoutDetector,
    layout::{
        element::Candidate,
        page::{PageError, PageOutcome, PageResult},
    },
    render::{PageImage, Rasterizer, annotate::save_annotated},
};

/// What to do with the rest of the document when a page fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PagePolicy {
    /// Stop at the first failing page and return its error.
    #[default]
    Abort,
    /// Report the failing page as a `PageError` and continue.
    Skip,
}

/// Configuration for the layout parser
#[derive(Debug, Clone, Builder)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct ParserConfig {
    /// Render resolution in dots per inch
    pub dpi: u32,
    /// Side of the square model input
    pub input_size: usize,
    /// Channel order the model expects
    pub channel_order: ChannelOrder,
    /// Detections must score strictly above this
    pub score_threshold: f32,
    /// IoU above which NMS drops the lower-scoring box
    pub iou_threshold: f32,
    pub nms_policy: NmsPolicy,
    pub page_policy: PagePolicy,
    /// Upper bound for one forward pass
    #[builder(setter(strip_option))]
    pub inference_timeout: Option<Duration>,
    /// Class names; raw indices are reported without one
    #[builder(setter(strip_option))]
    pub labels: Option<LabelMap>,
    /// Directory receiving `page-<n>.png` previews
    #[builder(setter(into, strip_option))]
    pub annotate_dir: Option<PathBuf>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            input_size: INPUT_SIZE,
            channel_order: ChannelOrder::Rgb,
            score_threshold: SCORE_THRESHOLD,
            iou_threshold: NMS_IOU_THRESHOLD,
            nms_policy: NmsPolicy::ClassAgnostic,
            page_policy: PagePolicy::Abort,
            inference_timeout: None,
            labels: None,
            annotate_dir: None,
        }
    }
}

impl ParserConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.dpi == Some(0) {
            return Err("dpi must be positive".to_string());
        }
        if self.input_size == Some(0) {
            return Err("input size must be positive".to_string());
        }
        for (name, value) in [
            ("score threshold", self.score_threshold),
            ("iou threshold", self.iou_threshold),
        ] {
            if let Some(value) = value
                && !(0.0..=1.0).contains(&value)
            {
                return Err(format!("{name} {value} is outside [0, 1]"));
            }
        }
        Ok(())
    }
}

impl ParserConfig {
    pub fn postprocess_config(&self) -> PostprocessConfig {
        PostprocessConfig {
            input_size: self.input_size,
            score_threshold: self.score_threshold,
            iou_threshold: self.iou_threshold,
            nms_policy: self.nms_policy,
        }
    }
}

/// Runs layout detection page by page over a document.
///
/// The detector is the only state shared between pages. It sits behind a
/// mutex; rendering and every forward pass run on the blocking pool.
pub struct LayoutParser<R: Rasterizer, D: LayoutDetector> {
    rasterizer: Arc<R>,
    detector: Arc<Mutex<D>>,
    config: ParserConfig,
}

impl<R, D> LayoutParser<R, D>
where
    R: Rasterizer + Send + Sync + 'static,
    D: LayoutDetector + 'static,
{
    pub fn new(rasterizer: R, detector: D, config: ParserConfig) -> Self {
        Self {
            rasterizer: Arc::new(rasterizer),
            detector: Arc::new(Mutex::new(detector)),
            config,
        }
    }

    /// Parses every page in order, handing each outcome to `sink`.
    ///
    /// The detector is prepared once before the first page, outside the
    /// inference timeout; a preparation failure aborts under every policy.
    /// Returns the number of pages in the document.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn parse_each<F>(&self, path: &Path, mut sink: F) -> Result<usize, DocparseError>
    where
        F: FnMut(PageOutcome) -> Result<(), DocparseError>,
    {
        let rasterizer = Arc::clone(&self.rasterizer);
        let document = path.to_path_buf();
        let page_count = task::spawn_blocking(move || rasterizer.page_count(&document))
            .await
            .context(RenderTaskSnafu)??;
        info!("start layout detection on {} pages", page_count);

        self.prepare().await?;

        let start = Instant::now();
        for page_index in 0..page_count {
            let page = page_index + 1;
            match self.parse_page(path, page_index).await {
                Ok(result) => {
                    info!("page {} has {} regions", page, result.regions.len());
                    sink(PageOutcome::Page(result))?;
                }
                Err(err) if self.config.page_policy == PagePolicy::Skip && !err.is_fatal() => {
                    warn!("skip page {}: {}", page, err);
                    sink(PageOutcome::Failed(PageError::new(page, &err)))?;
                }
                Err(err) => {
                    error!("abort on page {}: {}", page, err);
                    return Err(err);
                }
            }
        }

        info!(
            "layout detection finished in {}ms",
            start.elapsed().as_millis()
        );
        Ok(page_count)
    }

    /// Parses the whole document and collects the outcomes.
    pub async fn parse(&self, path: &Path) -> Result<Vec<PageOutcome>, DocparseError> {
        let mut outcomes = Vec::new();
        self.parse_each(path, |outcome| {
            outcomes.push(outcome);
            Ok(())
        })
        .await?;
        Ok(outcomes)
    }

    /// Rasterizes, preprocesses, infers and postprocesses one page.
    pub async fn parse_page(
        &self,
        path: &Path,
        page_index: usize,
    ) -> Result<PageResult, DocparseError> {
        let page = page_index + 1;
        let image = self.render(path, page_index).await?;
        image.ensure_not_degenerate()?;

        let (input, transform) =
            letterbox(&image, self.config.input_size, self.config.channel_order)?;
        debug!(
            "page {} {}x{} letterboxed with scale {}",
            page,
            image.width(),
            image.height(),
            transform.scale
        );

        let candidates = self.infer(input).await?;

        let regions = postprocess(
            &candidates,
            (image.width(), image.height()),
            &self.config.postprocess_config(),
            self.config.labels.as_ref(),
        );

        if let Some(dir) = &self.config.annotate_dir {
            let output = save_annotated(dir, page, &image, &regions)?;
            debug!("annotated page {} saved to {}", page, output.display());
        }

        Ok(PageResult { page, regions })
    }

    async fn render(&self, path: &Path, page_index: usize) -> Result<PageImage, DocparseError> {
        let rasterizer = Arc::clone(&self.rasterizer);
        let document = path.to_path_buf();
        let dpi = self.config.dpi;

        task::spawn_blocking(move || rasterizer.render_page(&document, page_index, dpi))
            .await
            .context(RenderTaskSnafu)?
    }

    async fn prepare(&self) -> Result<(), DocparseError> {
        let detector = Arc::clone(&self.detector);
        let instant = Instant::now();

        task::spawn_blocking(move || detector.blocking_lock().prepare())
            .await
            .context(InferenceTaskSnafu)??;

        debug!("detector ready in {}ms", instant.elapsed().as_millis());
        Ok(())
    }

    async fn infer(&self, input: Array4<f32>) -> Result<Vec<Candidate>, DocparseError> {
        let detector = Arc::clone(&self.detector);
        let handle = task::spawn_blocking(move || detector.blocking_lock().infer(&input));

        let joined = match self.config.inference_timeout {
            Some(timeout) => tokio::time::timeout(timeout, handle)
                .await
                .map_err(|_| InferenceTimeoutSnafu { timeout }.build())?,
            None => handle.await,
        };

        joined.context(InferenceTaskSnafu)?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        analysis::{bbox::Bbox, labels::RegionLabel},
        error::ErrorKind,
        render::PageImage,
    };

    /// In-memory document: one entry per page, `None` fails to render.
    struct FakeRasterizer {
        pages: Vec<Option<(usize, usize)>>,
    }

    impl Rasterizer for FakeRasterizer {
        fn page_count(&self, _path: &Path) -> Result<usize, DocparseError> {
            Ok(self.pages.len())
        }

        fn render_page(
            &self,
            _path: &Path,
            page_index: usize,
            _dpi: u32,
        ) -> Result<PageImage, DocparseError> {
            match self.pages.get(page_index).copied().flatten() {
                Some((width, height)) => {
                    PageImage::from_raw(width, height, vec![255; width * height * 3])
                }
                None => Err(DocparseError::PageOutOfRange {
                    page: page_index,
                    page_count: self.pages.len(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct FakeDetector {
        candidates: Vec<Candidate>,
        calls: Arc<AtomicUsize>,
        delay: Option<Duration>,
        missing_model: bool,
        prepares: Arc<AtomicUsize>,
        prepare_delay: Option<Duration>,
        missing_input: bool,
    }

    impl LayoutDetector for FakeDetector {
        fn prepare(&mut self) -> Result<(), DocparseError> {
            self.prepares.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.prepare_delay {
                std::thread::sleep(delay);
            }
            if self.missing_input {
                return Err(DocparseError::NotFoundInput {
                    input_name: "images".to_string(),
                });
            }
            Ok(())
        }

        fn infer(&mut self, input: &Array4<f32>) -> Result<Vec<Candidate>, DocparseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(input.shape(), &[1, 3, 64, 64]);
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            if self.missing_model {
                return Err(DocparseError::ModelNotFound {
                    path: "layout.onnx".to_string(),
                });
            }
            Ok(self.candidates.clone())
        }
    }

    fn config() -> ParserConfigBuilder {
        let mut builder = ParserConfigBuilder::default();
        builder.input_size(64);
        builder
    }

    fn one_box() -> Vec<Candidate> {
        vec![Candidate::new(
            Bbox::from_corners(10.0, 10.0, 20.0, 30.0),
            0.9,
            3,
        )]
    }

    #[tokio::test]
    async fn test_single_page_single_region() {
        let rasterizer = FakeRasterizer {
            pages: vec![Some((128, 128))],
        };
        let detector = FakeDetector {
            candidates: one_box(),
            ..Default::default()
        };
        let parser = LayoutParser::new(rasterizer, detector, config().build().unwrap());

        let outcomes = parser.parse(Path::new("doc.pdf")).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        let PageOutcome::Page(result) = &outcomes[0] else {
            panic!("page failed: {:?}", outcomes[0]);
        };
        assert_eq!(result.page, 1);
        assert_eq!(result.regions.len(), 1);
        assert_eq!(result.regions[0].bbox, [20.0, 20.0, 20.0, 40.0]);
        assert_eq!(result.regions[0].label, RegionLabel::Index(3));
    }

    #[tokio::test]
    async fn test_label_map_is_applied() {
        let rasterizer = FakeRasterizer {
            pages: vec![Some((64, 32))],
        };
        let detector = FakeDetector {
            candidates: one_box(),
            ..Default::default()
        };
        let mut builder = config();
        builder.labels(LabelMap::doclaynet());
        let parser = LayoutParser::new(rasterizer, detector, builder.build().unwrap());

        let outcomes = parser.parse(Path::new("doc.pdf")).await.unwrap();
        let PageOutcome::Page(result) = &outcomes[0] else {
            panic!("page failed");
        };
        assert_eq!(
            result.regions[0].label,
            RegionLabel::Name("List-item".to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_detections_are_valid() {
        let rasterizer = FakeRasterizer {
            pages: vec![Some((100, 50)), Some((50, 100))],
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let detector = FakeDetector {
            candidates: vec![Candidate::new(
                Bbox::from_corners(0.0, 0.0, 5.0, 5.0),
                0.1,
                0,
            )],
            calls: Arc::clone(&calls),
            ..Default::default()
        };
        let parser = LayoutParser::new(rasterizer, detector, config().build().unwrap());

        let outcomes = parser.parse(Path::new("doc.pdf")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            outcomes,
            vec![
                PageOutcome::Page(PageResult {
                    page: 1,
                    regions: Vec::new()
                }),
                PageOutcome::Page(PageResult {
                    page: 2,
                    regions: Vec::new()
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_skip_policy_reports_failed_pages() {
        let rasterizer = FakeRasterizer {
            pages: vec![Some((64, 64)), Some((0, 64)), None, Some((64, 64))],
        };
        let detector = FakeDetector {
            candidates: one_box(),
            ..Default::default()
        };
        let mut builder = config();
        builder.page_policy(PagePolicy::Skip);
        let parser = LayoutParser::new(rasterizer, detector, builder.build().unwrap());

        let outcomes = parser.parse(Path::new("doc.pdf")).await.unwrap();
        let pages = outcomes.iter().map(PageOutcome::page).collect::<Vec<_>>();
        assert_eq!(pages, vec![1, 2, 3, 4]);

        let PageOutcome::Failed(degenerate) = &outcomes[1] else {
            panic!("page 2 should fail");
        };
        assert_eq!(degenerate.error.kind, ErrorKind::DegeneratePage);
        let PageOutcome::Failed(missing) = &outcomes[2] else {
            panic!("page 3 should fail");
        };
        assert_eq!(missing.error.kind, ErrorKind::Input);
        assert!(matches!(outcomes[3], PageOutcome::Page(_)));
    }

    #[tokio::test]
    async fn test_abort_policy_stops_at_first_failure() {
        let rasterizer = FakeRasterizer {
            pages: vec![Some((64, 64)), Some((64, 0)), Some((64, 64))],
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let detector = FakeDetector {
            candidates: one_box(),
            calls: Arc::clone(&calls),
            ..Default::default()
        };
        let parser = LayoutParser::new(rasterizer, detector, config().build().unwrap());

        let mut seen = Vec::new();
        let err = parser
            .parse_each(Path::new("doc.pdf"), |outcome| {
                seen.push(outcome.page());
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DocparseError::DegeneratePage { .. }));
        assert_eq!(seen, vec![1]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_under_skip_policy() {
        let rasterizer = FakeRasterizer {
            pages: vec![Some((64, 64)), Some((64, 64))],
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let detector = FakeDetector {
            calls: Arc::clone(&calls),
            missing_model: true,
            ..Default::default()
        };
        let mut builder = config();
        builder.page_policy(PagePolicy::Skip);
        let parser = LayoutParser::new(rasterizer, detector, builder.build().unwrap());

        let err = parser.parse(Path::new("doc.pdf")).await.unwrap_err();
        assert!(matches!(err, DocparseError::ModelNotFound { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inference_timeout() {
        let rasterizer = FakeRasterizer {
            pages: vec![Some((64, 64))],
        };
        let detector = FakeDetector {
            candidates: one_box(),
            delay: Some(Duration::from_millis(300)),
            ..Default::default()
        };
        let mut builder = config();
        builder
            .page_policy(PagePolicy::Skip)
            .inference_timeout(Duration::from_millis(20));
        let parser = LayoutParser::new(rasterizer, detector, builder.build().unwrap());

        let outcomes = parser.parse(Path::new("doc.pdf")).await.unwrap();
        let PageOutcome::Failed(failed) = &outcomes[0] else {
            panic!("page should time out");
        };
        assert_eq!(failed.error.kind, ErrorKind::Inference);
        assert!(failed.error.message.contains("did not finish"));
    }

    #[tokio::test]
    async fn test_slow_preparation_is_not_timed() {
        let rasterizer = FakeRasterizer {
            pages: vec![Some((64, 64)), Some((64, 64))],
        };
        let prepares = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let detector = FakeDetector {
            candidates: one_box(),
            calls: Arc::clone(&calls),
            prepares: Arc::clone(&prepares),
            prepare_delay: Some(Duration::from_millis(300)),
            ..Default::default()
        };
        let mut builder = config();
        builder.inference_timeout(Duration::from_millis(100));
        let parser = LayoutParser::new(rasterizer, detector, builder.build().unwrap());

        let outcomes = parser.parse(Path::new("doc.pdf")).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(
            outcomes
                .iter()
                .all(|outcome| matches!(outcome, PageOutcome::Page(_)))
        );
        assert_eq!(prepares.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_preparation_failure_aborts_under_skip_policy() {
        let rasterizer = FakeRasterizer {
            pages: vec![Some((64, 64)), Some((64, 64))],
        };
        let prepares = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let detector = FakeDetector {
            calls: Arc::clone(&calls),
            prepares: Arc::clone(&prepares),
            missing_input: true,
            ..Default::default()
        };
        let mut builder = config();
        builder.page_policy(PagePolicy::Skip);
        let parser = LayoutParser::new(rasterizer, detector, builder.build().unwrap());

        let mut seen = Vec::new();
        let err = parser
            .parse_each(Path::new("doc.pdf"), |outcome| {
                seen.push(outcome.page());
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DocparseError::NotFoundInput { .. }));
        assert!(seen.is_empty());
        assert_eq!(prepares.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_timed_out_pass_does_not_hold_up_the_run() {
        let rasterizer = FakeRasterizer {
            pages: vec![Some((64, 64))],
        };
        let detector = FakeDetector {
            candidates: one_box(),
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        let mut builder = config();
        builder.inference_timeout(Duration::from_millis(50));
        let parser = LayoutParser::new(rasterizer, detector, builder.build().unwrap());

        let start = Instant::now();
        let result = crate::parse::block_on(parser.parse(Path::new("doc.pdf"))).unwrap();

        assert!(matches!(
            result,
            Err(DocparseError::InferenceTimeout { .. })
        ));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    struct ThreadRecordingRasterizer {
        inner: FakeRasterizer,
        threads: Arc<std::sync::Mutex<Vec<std::thread::ThreadId>>>,
    }

    impl Rasterizer for ThreadRecordingRasterizer {
        fn page_count(&self, path: &Path) -> Result<usize, DocparseError> {
            self.inner.page_count(path)
        }

        fn render_page(
            &self,
            path: &Path,
            page_index: usize,
            dpi: u32,
        ) -> Result<PageImage, DocparseError> {
            self.threads
                .lock()
                .unwrap()
                .push(std::thread::current().id());
            self.inner.render_page(path, page_index, dpi)
        }
    }

    #[tokio::test]
    async fn test_rendering_runs_off_the_runtime_thread() {
        let threads = Arc::new(std::sync::Mutex::new(Vec::new()));
        let rasterizer = ThreadRecordingRasterizer {
            inner: FakeRasterizer {
                pages: vec![Some((64, 64)), Some((64, 64))],
            },
            threads: Arc::clone(&threads),
        };
        let parser = LayoutParser::new(
            rasterizer,
            FakeDetector::default(),
            config().build().unwrap(),
        );

        parser.parse(Path::new("doc.pdf")).await.unwrap();

        let runtime_thread = std::thread::current().id();
        let threads = threads.lock().unwrap();
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|thread| *thread != runtime_thread));
    }

    #[tokio::test]
    async fn test_annotated_pages_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let rasterizer = FakeRasterizer {
            pages: vec![Some((64, 64)), Some((64, 64))],
        };
        let detector = FakeDetector {
            candidates: one_box(),
            ..Default::default()
        };
        let mut builder = config();
        builder.annotate_dir(dir.path());
        let parser = LayoutParser::new(rasterizer, detector, builder.build().unwrap());

        parser.parse(Path::new("doc.pdf")).await.unwrap();
        assert!(dir.path().join("page-1.png").exists());
        assert!(dir.path().join("page-2.png").exists());
    }

    #[test]
    fn test_parser_config_default() {
        let config = ParserConfig::default();
        assert_eq!(config.dpi, 224);
        assert_eq!(config.input_size, 1024);
        assert_eq!(config.score_threshold, 0.3);
        assert_eq!(config.iou_threshold, 0.45);
        assert_eq!(config.nms_policy, NmsPolicy::ClassAgnostic);
        assert_eq!(config.page_policy, PagePolicy::Abort);
        assert!(config.inference_timeout.is_none());
    }

    #[test]
    fn test_parser_config_validation() {
        let mut builder = ParserConfigBuilder::default();
        builder.score_threshold(1.5);
        assert!(builder.build().is_err());

        let mut builder = ParserConfigBuilder::default();
        builder.input_size(0);
        assert!(builder.build().is_err());

        let config = ParserConfigBuilder::default().dpi(72).build().unwrap();
        assert_eq!(config.dpi, 72);
        assert_eq!(config.input_size, 1024);
    }
}
