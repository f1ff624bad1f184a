//! # isopack: declarative ISO-8583 / EMV TLV message packing
//!
//! A message layout is described once as a tree of field definitions, validated, and then used to
//! pack and unpack any number of messages. Nothing in the engine knows a particular dialect:
//! every wire detail comes from the codecs attached to the definitions.
//!
//! ## Field types
//!
//! | Type          | Wire layout                                      |
//! |---------------|--------------------------------------------------|
//! | `TAG_LEN_VAL` | tag, length (of the body), body                  |
//! | `LEN_TAG_VAL` | length (of tag and body), tag, body              |
//! | `TAG_VAL`     | tag, fixed-length body                           |
//! | `LEN_VAL`     | length, body                                     |
//! | `BIT_SET`     | presence bitmap, then the flagged children       |
//! | `VAL`         | fixed-length body, or contiguous children        |
//! | `MSG`         | children only, no header                         |
//!
//! ## Codecs
//!
//! - Body: BCD with left-zero, left-`F`, right-`F` or no padding; BCD integer; hex; ASCII;
//!   EBCDIC; literal bytes ([`BodyCodec`]).
//! - Length: BCD, binary, ASCII, EBCDIC decimal, self-describing hex ([`LengthCodec`]).
//! - Tag: hex, literal, BCD, EBCDIC/ASCII decimal, ASCII text ([`TagCodec`]).
//! - Presence bitmap: IFB (binary) and IFA (ASCII hex), fixed or with extension blocks
//!   ([`BitmapCodec`]).
//!
//! ## Example
//!
//! ```
//! use isopack::{FieldBuilder, FieldType, Message};
//! use isopack::packer::{BcdPadding, BodyCodec};
//!
//! let def = FieldBuilder::new(FieldType::Val)
//!     .name("amount")
//!     .len(2)
//!     .body_codec(BodyCodec::Bcd(BcdPadding::LeftZero))
//!     .into_validated()?;
//!
//! let mut msg = Message::new(&def);
//! msg.set_value("123")?;
//! assert_eq!(msg.pack()?, vec![0x01, 0x23]);
//!
//! let back = Message::unpack(&def, &[0x04, 0x56])?;
//! assert_eq!(back.value().and_then(|v| v.as_str()), Some("456"));
//! # Ok::<(), isopack::PackError>(())
//! ```
//!
//! Layouts can also be written as text, see [`layout`].

pub mod builder;
pub mod codec;
pub mod dump;
pub mod error;
pub mod field;
pub mod layout;
pub mod message;
pub mod navigate;
pub mod packer;
pub mod validator;
pub mod value;

pub use builder::FieldBuilder;
pub use codec::Codec;
pub use dump::{DisplayStringer, HexStringer, Masker, PanMasker, Stringer, Visualizer};
pub use error::{CodecError, PackError, Result};
pub use field::{FieldDef, FieldId, FieldNode, FieldType};
pub use layout::{build_layout, load_layout, parse_layout};
pub use message::{Message, ValueId, ValueNode, ValueTree};
pub use navigate::Step;
pub use packer::{BcdPadding, BitmapCodec, BitmapLayout, BodyCodec, LengthCodec, TagCodec};
pub use validator::{ValidationRule, Violation};
pub use value::{Tag, Value};
