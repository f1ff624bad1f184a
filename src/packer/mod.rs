//! Codec strategies.
//!
//! Each field combines up to four independent codecs:
//!
//! - a [body codec](body::BodyCodec) for its value,
//! - a [length codec](length::LengthCodec) for its length prefix,
//! - a [tag codec](tag::TagCodec), owned by the parent, for its tag prefix,
//! - a [bitmap codec](bitmap::BitmapCodec) when it is a `BIT_SET`.
//!
//! Codecs are plain immutable values. They hold no state between calls, so one instance can be
//! shared by any number of definitions and threads.

pub(crate) mod bcd;
pub mod bitmap;
pub mod body;
pub(crate) mod ebcdic;
pub mod hex;
pub mod length;
pub mod tag;

pub use bitmap::{BitmapCodec, BitmapLayout};
pub use body::{BcdPadding, BodyCodec};
pub use length::LengthCodec;
pub use tag::TagCodec;
