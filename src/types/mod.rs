//! Domain types and contract bindings.

mod order;
pub use order::{Constraints, Nft, NftToken, Order};

mod order_match;
pub use order_match::{MatchData, MatchId, MatchState, MatchStatus, MatchType, OrderMatch};

mod bundle;
pub(crate) use bundle::{build_constructed_order, flatten_order_items};
pub use bundle::{BundleItem, MatchOrdersItem, OneToOneItem, PricedBundleItem, RejectedItem};

pub mod exchange;
pub use exchange::MatchExchange;

mod tokens;
pub use tokens::{IERC20, IERC721};
