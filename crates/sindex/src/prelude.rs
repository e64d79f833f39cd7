pub(crate) use crate::config::{Config, Runtime};
pub(crate) use crate::error::{bail, SindexError, SindexResult};
pub(crate) use crate::progress::ProgressBarBuilder;
pub(crate) use crate::project::Project;
