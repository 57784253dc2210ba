//! PDF rendering.
//!
//! # Modules
//!
//! - `backend` - typesetters: local pandoc or pandoc in a container
//! - `context` - template data shared by the tasks of a pass
//! - `dispatch` - semaphore-bounded task spawning with a join barrier
//! - `git` - approval dates from the approved branch
//! - `preprocess` - metadata block and scratch Markdown file
//! - `task` - one document to one artifact

mod backend;
mod context;
mod dispatch;
mod error;
mod git;
mod preprocess;
mod task;

pub use backend::{Invocation, Typesetter, select_typesetter};
pub use context::TemplateContext;
pub use dispatch::{Dispatcher, PassReport};
pub use error::RenderError;
pub use git::ApprovalLookup;
pub use task::{PdfJob, RenderJob};
