//! Recursive resource generation.
//!
//! A [`Generator`] turns a [`ResourceLocator`](mosaic_locator::ResourceLocator)
//! into tile pyramids: archives fan out into one job per member, images are
//! decoded and cut into tiles that go to a
//! [`TileWriter`](mosaic_cache::TileWriter). Progress is reported per node
//! through a [`Sink`]; a [`Tracker`] turns those reports into completion of
//! a whole tree.

mod codec;
pub mod error;
mod generator;
mod model;
mod sink;
mod tracker;

pub use crate::codec::{Codec, ImageCodec};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::generator::Generator;
pub use crate::model::{ArchiveInfo, ImageData, ImageInfo, Mode, ResourceInfo, ResourceKind, ResourceStatus, Settings};
pub use crate::sink::{ChannelSink, EventKind, GeneratorEvent, LogSink, Sink, SinkHandle};
pub use crate::tracker::Tracker;
