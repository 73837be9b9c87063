use std::fmt;

use crate::Termination;

/// Smallest price the search form offers, in CHF.
pub const PRICE_FLOOR: u32 = 200;
/// Largest price the search form offers, in CHF.
pub const PRICE_CEILING: u32 = 1500;
/// Prices are offered in steps of this many CHF.
pub const PRICE_STEP: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamsError {
    #[error("price {0} is outside 200..=1500 or not a multiple of 50")]
    PriceOutOfRange(u32),
    #[error("minimum price {min} exceeds maximum price {max}")]
    InvertedRange { min: u32, max: u32 },
    #[error("region must not be empty")]
    EmptyRegion,
}

/// Validated search form input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    min_price: u32,
    max_price: u32,
    region: String,
    permanent_only: bool,
}

impl SearchParams {
    pub fn new(
        min_price: u32,
        max_price: u32,
        region: impl Into<String>,
        permanent_only: bool,
    ) -> Result<Self, ParamsError> {
        validate_price(min_price)?;
        validate_price(max_price)?;
        if min_price > max_price {
            return Err(ParamsError::InvertedRange {
                min: min_price,
                max: max_price,
            });
        }
        let region = region.into().trim().to_string();
        if region.is_empty() {
            return Err(ParamsError::EmptyRegion);
        }
        Ok(Self {
            min_price,
            max_price,
            region,
            permanent_only,
        })
    }

    pub fn min_price(&self) -> u32 {
        self.min_price
    }

    pub fn max_price(&self) -> u32 {
        self.max_price
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn permanent_only(&self) -> bool {
        self.permanent_only
    }
}

fn validate_price(price: u32) -> Result<(), ParamsError> {
    if (PRICE_FLOOR..=PRICE_CEILING).contains(&price) && price % PRICE_STEP == 0 {
        Ok(())
    } else {
        Err(ParamsError::PriceOutOfRange(price))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Captcha,
    VerificationFailed,
    Browser(String),
    /// A step was reported that the current state cannot take.
    UnexpectedStep { state: String, step: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Captcha => write!(f, "captcha detected"),
            FailureReason::VerificationFailed => write!(f, "results page not confirmed"),
            FailureReason::Browser(msg) => write!(f, "browser: {msg}"),
            FailureReason::UnexpectedStep { state, step } => {
                write!(f, "unexpected step {step} in state {state}")
            }
        }
    }
}

/// Where the search run currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchState {
    #[default]
    Init,
    FormVisible,
    Submitted,
    Verifying,
    ResultsPage(u32),
    Done(Termination),
    Failed(FailureReason),
}

impl SearchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SearchState::Done(_) | SearchState::Failed(_))
    }
}

/// Steps reported by the driver of the search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStep {
    FormReady,
    FormSubmitted,
    Settled,
    ResultsConfirmed,
    NextPageRequested,
    Finished(Termination),
    Fail(FailureReason),
}

/// Pure transition function for the search run.
pub fn advance(state: SearchState, step: SearchStep) -> SearchState {
    match (state, step) {
        (state, _) if state.is_terminal() => state,
        (_, SearchStep::Fail(reason)) => SearchState::Failed(reason),
        (SearchState::Init, SearchStep::FormReady) => SearchState::FormVisible,
        (SearchState::FormVisible, SearchStep::FormSubmitted) => SearchState::Submitted,
        (SearchState::Submitted, SearchStep::Settled) => SearchState::Verifying,
        (SearchState::Verifying, SearchStep::ResultsConfirmed) => SearchState::ResultsPage(1),
        (SearchState::ResultsPage(n), SearchStep::NextPageRequested) => {
            SearchState::ResultsPage(n + 1)
        }
        (SearchState::ResultsPage(_), SearchStep::Finished(termination)) => {
            SearchState::Done(termination)
        }
        (state, step) => SearchState::Failed(FailureReason::UnexpectedStep {
            state: format!("{state:?}"),
            step: format!("{step:?}"),
        }),
    }
}
