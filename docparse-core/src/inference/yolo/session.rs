use std::time::Instant;

use ndarray::Array4;
use ort::{
    session::{Session, builder::SessionBuilder},
    value::TensorRef,
};
use snafu::{OptionExt, ResultExt};
use tracing::*;

use crate::{
    error::*,
    inference::{
        model::{LayoutDetector, Model, session_builder},
        yolo::{model::LayoutModel, output::decode_output},
    },
    layout::element::Candidate,
};

pub struct YoloSession<M: Model> {
    session: Session,
    model: M,
    input_name: String,
    output_name: String,
}

impl YoloSession<LayoutModel> {
    /// Loads the model file into a session. Fails fast on missing or
    /// malformed models.
    pub fn load(model: LayoutModel) -> Result<Self, DocparseError> {
        model.ensure_exists()?;
        let builder = session_builder(model.config().intra_threads)?;
        Self::commit(builder, model)
    }

    fn commit(session: SessionBuilder, model: LayoutModel) -> Result<Self, DocparseError> {
        let session = session
            .commit_from_file(model.path())
            .context(OrtInitSnafu { stage: "commit" })?;

        let input_name = match session
            .inputs
            .iter()
            .find(|input| input.name == LayoutModel::INPUT_NAME)
            .or_else(|| session.inputs.first())
        {
            Some(input) => input.name.clone(),
            None => {
                return NotFoundInputSnafu {
                    input_name: LayoutModel::INPUT_NAME,
                }
                .fail();
            }
        };
        if input_name != LayoutModel::INPUT_NAME {
            warn!(
                "model has no `{}` input, binding `{}` instead",
                LayoutModel::INPUT_NAME,
                input_name
            );
        }

        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .context(NotFoundOutputSnafu {
                output_name: "output0",
            })?;

        info!(
            "loaded {} from {}, input `{}`, output `{}`",
            LayoutModel::MODEL_NAME,
            model.path().display(),
            input_name,
            output_name
        );

        Ok(Self {
            session,
            model,
            input_name,
            output_name,
        })
    }
}

impl LayoutDetector for YoloSession<LayoutModel> {
    fn infer(&mut self, input: &Array4<f32>) -> Result<Vec<Candidate>, DocparseError> {
        let instant = Instant::now();

        let output = self
            .session
            .run(ort::inputs![
                self.input_name.as_str() => TensorRef::from_array_view(input).context(TensorSnafu{stage: "input"})?
            ])
            .context(InferenceSnafu {})?;

        let tensor = output
            .get(self.output_name.as_str())
            .context(NotFoundOutputSnafu {
                output_name: &self.output_name,
            })?
            .try_extract_array::<f32>()
            .context(TensorSnafu { stage: "extract" })?;

        let candidates = decode_output(tensor, self.model.config().num_classes)?;
        debug!(
            "inference produced {} candidates in {}ms",
            candidates.len(),
            instant.elapsed().as_millis()
        );

        Ok(candidates)
    }
}

/// Owns the layout session and builds it on first use.
///
/// The session is expensive to construct, so it is created once by
/// `get_session` and reused for every later page.
pub struct LazySession {
    model: LayoutModel,
    session: Option<YoloSession<LayoutModel>>,
}

impl LazySession {
    pub fn new(model: LayoutModel) -> Self {
        Self {
            model,
            session: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    pub fn get_session(&mut self) -> Result<&mut YoloSession<LayoutModel>, DocparseError> {
        let session = match self.session.take() {
            Some(session) => session,
            None => YoloSession::load(self.model.clone())?,
        };

        Ok(self.session.insert(session))
    }
}

impl LayoutDetector for LazySession {
    fn prepare(&mut self) -> Result<(), DocparseError> {
        self.get_session().map(|_| ())
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Vec<Candidate>, DocparseError> {
        self.get_session()?.infer(input)
    }
}
