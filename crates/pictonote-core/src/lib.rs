//! PictoNote Core Library
//!
//! Composition engine, wire records and reconnecting channel transport for
//! the PictoNote sticky-note chat client.

pub mod bounds;
pub mod compose;
pub mod effects;
pub mod export;
pub mod input;
pub mod message;
pub mod palette;
pub mod session;
pub mod settings;
pub mod surface;
pub mod sync;
pub mod text;
pub mod tools;

pub use bounds::{ContentBounds, ZoneScanner, is_blank};
pub use compose::{ComposeError, ComposeResult, ComposeSlot};
pub use effects::{Cue, Effects, NoEffects, RecordedEffects, SharedEffects, no_effects};
pub use export::{Authorship, data_uri_bytes, decode_data_uri, encode_png};
pub use input::{DropEvent, KeyInput, PointerEvent, PointerSource};
pub use message::{ClientFrame, MessageRecord, Presence, ServerFrame, UserContent};
pub use palette::{Rgba8, Swatch};
pub use session::{ChannelSession, MessageLog, SessionError};
pub use settings::{SettingsError, UserSettings};
pub use surface::{SurfacePair, SurfaceSize, ZONE_COUNT};
pub use sync::{
    ConnectionState, Connector, ReconnectingTransport, SendOutcome, Subscription,
    TransportError, TransportListener,
};
#[cfg(not(target_arch = "wasm32"))]
pub use sync::{NativeConnection, NativeConnector};
pub use text::{DEFAULT_ANCHOR, TextCursorEngine};
pub use tools::{BrushSize, StrokeTracker, ToolKind, ToolState};
