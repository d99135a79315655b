mod attribute;
mod data_value;
mod node_id;
mod numeric_range;
mod status;
mod variant;

pub use attribute::AttributeId;
pub use data_value::{DataValue, TimestampsToReturn};
pub use node_id::{Identifier, NodeId, NodeIdParseError};
pub use numeric_range::{NumericRange, NumericRangeParseError};
pub use status::StatusCode;
pub use variant::{Variant, VariantCastError, VariantKind};
