//! File format handlers for the SCS PIX family
//!
//! `pix` is the shared text container; the other modules map their
//! section layouts onto plain data types.

pub mod pia;
pub mod pic;
pub mod pim;
pub mod pip;
pub mod pis;
pub mod pit;
pub mod pix;
pub mod sii;
pub mod tobj;

// Re-export the container types
pub use pix::{FileKind, Header, PixFile, Section, Value, WriteOptions};

// Re-export main document types
pub use pia::{BoneChannel, CustomChannel, PiaAnimation, read_pia, write_pia};
pub use pic::{ColliderLocator, PicModel, PicShape, read_pic, write_pic};
pub use pim::{PimDialect, PimModel, read_pim, write_pim};
pub use pip::{PipPrefab, read_pip, write_pip};
pub use pis::{PisBone, PisSkeleton, read_pis, write_pis};
pub use pit::{PitTrait, read_pit, write_pit};
pub use sii::SiiLibrary;
pub use tobj::{TextureObject, read_tobj, write_tobj};
