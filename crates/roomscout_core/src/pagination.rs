use std::fmt;

use chrono::NaiveDate;

use crate::ListingCandidate;

/// Page counter parsed from one results page.
///
/// Both fields are `None` when the page carries no counter, which means
/// "pagination unknown, assume a single page".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationState {
    pub current_page: Option<u32>,
    pub total_pages: Option<u32>,
}

impl PaginationState {
    pub fn new(current_page: u32, total_pages: u32) -> Self {
        Self {
            current_page: Some(current_page),
            total_pages: Some(total_pages),
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_known(&self) -> bool {
        self.current_page.is_some() && self.total_pages.is_some()
    }
}

/// Why the pagination loop stopped. Every variant is a graceful stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The last page was collected; `total` is `None` when the site showed no counter.
    LastPage { page: u32, total: Option<u32> },
    /// A pluggable stop rule ended the run early.
    StopRule { page: u32, rule: &'static str },
    NextControlMissing { page: u32 },
    NextControlDisabled { page: u32 },
    PageLoadTimeout { page: u32 },
    /// Counter on the page did not show the page that was requested.
    PaginationStale { expected: u32, parsed: u32 },
    BrowserFailure { page: u32, message: String },
}

impl Termination {
    /// Whether the stop means the result set may be incomplete.
    pub fn is_partial(&self) -> bool {
        !matches!(
            self,
            Termination::LastPage { .. }
                | Termination::StopRule { .. }
                | Termination::NextControlMissing { .. }
                | Termination::NextControlDisabled { .. }
        )
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::LastPage {
                page,
                total: Some(total),
            } => write!(f, "reached last page {page}/{total}"),
            Termination::LastPage { page, total: None } => {
                write!(f, "no pagination counter on page {page}, assuming single page")
            }
            Termination::StopRule { page, rule } => write!(f, "stop rule {rule} on page {page}"),
            Termination::NextControlMissing { page } => {
                write!(f, "next control not visible on page {page}")
            }
            Termination::NextControlDisabled { page } => {
                write!(f, "next control disabled on page {page}")
            }
            Termination::PageLoadTimeout { page } => write!(f, "timeout loading page {page}"),
            Termination::PaginationStale { expected, parsed } => {
                write!(f, "stale page: expected {expected}, parsed {parsed}")
            }
            Termination::BrowserFailure { page, message } => {
                write!(f, "browser failure on page {page}: {message}")
            }
        }
    }
}

/// Outcome of checking a freshly parsed page against the page that was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVerdict {
    Accept,
    Stale { expected: u32, parsed: u32 },
}

/// Rejects a page whose counter shows a different page than `expected`.
///
/// A page without a counter is accepted.
pub fn check_page(expected: u32, parsed: &PaginationState) -> PageVerdict {
    match parsed.current_page {
        Some(current) if current != expected => PageVerdict::Stale {
            expected,
            parsed: current,
        },
        _ => PageVerdict::Accept,
    }
}

/// Everything a stop rule may look at after a page was accepted.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    /// Page number the machine requested.
    pub page: u32,
    /// Largest total seen so far across pages.
    pub known_total: Option<u32>,
    pub pagination: PaginationState,
    pub items: &'a [ListingCandidate],
}

/// Decides whether the pagination loop ends after the current page.
pub trait StopPredicate: Send + Sync {
    fn should_stop(&self, ctx: &PageContext<'_>) -> Option<Termination>;
}

/// Stops once the counter says the last page was reached, or when no counter exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct LastPageReached;

impl StopPredicate for LastPageReached {
    fn should_stop(&self, ctx: &PageContext<'_>) -> Option<Termination> {
        let total = ctx.known_total.or(ctx.pagination.total_pages);
        let Some(total) = total else {
            return Some(Termination::LastPage {
                page: ctx.page,
                total: None,
            });
        };
        if ctx.page >= total {
            return Some(Termination::LastPage {
                page: ctx.page,
                total: Some(total),
            });
        }
        if let (Some(current), Some(parsed_total)) =
            (ctx.pagination.current_page, ctx.pagination.total_pages)
        {
            if current >= parsed_total {
                return Some(Termination::LastPage {
                    page: ctx.page,
                    total: Some(parsed_total),
                });
            }
        }
        None
    }
}

/// Stops as soon as a page lists something posted before `threshold`.
///
/// Only meaningful for sources sorted newest first.
#[derive(Debug, Clone, Copy)]
pub struct PostedBefore {
    pub threshold: NaiveDate,
}

impl StopPredicate for PostedBefore {
    fn should_stop(&self, ctx: &PageContext<'_>) -> Option<Termination> {
        ctx.items
            .iter()
            .filter_map(|item| item.posted)
            .any(|posted| posted < self.threshold)
            .then_some(Termination::StopRule {
                page: ctx.page,
                rule: "posted-before",
            })
    }
}

/// First rule that fires wins.
pub struct AnyOf(pub Vec<Box<dyn StopPredicate>>);

impl StopPredicate for AnyOf {
    fn should_stop(&self, ctx: &PageContext<'_>) -> Option<Termination> {
        self.0.iter().find_map(|rule| rule.should_stop(ctx))
    }
}
