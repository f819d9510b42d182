//! # bro
//!
//! A pipeline stage that turns file records into bundles by delegating to an
//! external module bundler.
//!
//! Each record flowing through a [`BroStage`] gets its own bundler session. The
//! bundler's output chunks are concatenated in arrival order and replace the
//! record's contents; the record then continues down the pipeline, or goes to a
//! caller-supplied side channel when a callback is configured. Bundling errors
//! never escape as panics or hard failures unless the caller asks for them with
//! [`ErrorStrategy::Emit`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use bro::{BroOptions, CommandBundlerFactory, CommandSpec, FileRecord, PipelineEvent};
//! use futures::stream;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let factory = CommandBundlerFactory::new(
//!     CommandSpec::parse("esbuild --bundle {entry}").expect("command"),
//! );
//! let stage = bro::bro(factory, BroOptions::new());
//!
//! let records = vec![FileRecord::from_path("src/main.js", "src")];
//! let (mut events, _task) = stage.pipe(stream::iter(records));
//!
//! while let Some(event) = events.recv().await {
//!     if let PipelineEvent::Record(record) = event {
//!         println!("{}: {} bytes", record.path.display(), record.contents_bytes().len());
//!     }
//! }
//! # }
//! ```
//!
//! ## Watch mode
//!
//! With [`BroOptions::watch`] the session of every record stays alive after the
//! first bundle. Dependency changes rebundle the same record and push it to the
//! destination again. Sessions run until [`BroStage::dispose`] is called.

pub mod bundler;
pub mod command;
pub mod cycle;
pub mod error;
pub mod factory;
pub mod options;
pub mod pipeline;
pub mod record;
pub mod router;
pub mod sink;
pub mod stage;
pub mod watch;

pub use bundler::{Bundler, BundlerFactory, BundlerInput, ChunkStream, Entry, EntrySource};
pub use command::{CommandBundler, CommandBundlerFactory, CommandSpec};
pub use cycle::{BundleCycle, BundleOutcome};
pub use error::{BundleError, ConfigError};
pub use factory::{BundlerSession, bundler_input, create_session};
pub use options::{BroArgs, BroConfig, BroOptions, Callback, ErrorHandler, ErrorStrategy};
pub use pipeline::{Destination, PipelineEvent, SideChannel, SideChannelWriter, side_channel};
pub use record::FileRecord;
pub use router::{ErrorRouter, format_error};
pub use sink::{LogSink, MemorySink, TracingSink};
pub use stage::{BroStage, WatchHandle, bro};
pub use watch::{SessionEvent, SessionEvents, SessionNotifier, WatchBundler};
