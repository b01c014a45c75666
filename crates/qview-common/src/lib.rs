// Shared map data, file formats and configuration for the qview workspace.

pub mod q_shared;
pub mod error;
pub mod qfiles;
pub mod bspfile;
pub mod palette;
pub mod level;
pub mod entities;
pub mod files;
pub mod cvar;

pub use error::{QError, QResult};
pub use level::{Level, MapData};
