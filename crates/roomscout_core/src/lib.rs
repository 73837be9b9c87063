//! Roomscout core: listing model, pagination rules and the pure search state machine.
mod dedupe;
mod listing;
mod pagination;
mod retry;
mod search;

pub use dedupe::{canonical_url, CandidateSet};
pub use listing::{
    BikeConnection, Coordinate, EnrichedListing, Leg, LegMode, ListingCandidate, ListingDetails,
    TransitConnection, Website,
};
pub use pagination::{
    check_page, AnyOf, LastPageReached, PageContext, PageVerdict, PaginationState, PostedBefore,
    StopPredicate, Termination,
};
pub use retry::RetryPolicy;
pub use search::{
    advance, FailureReason, ParamsError, SearchParams, SearchState, SearchStep, PRICE_CEILING,
    PRICE_FLOOR, PRICE_STEP,
};
