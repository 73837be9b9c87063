use std::sync::Once;

use pretty_assertions::assert_eq;
use roomscout_core::{
    advance, check_page, CandidateSet, LastPageReached, ListingCandidate, PageContext,
    PageVerdict, PaginationState, SearchState, SearchStep, StopPredicate, Termination, Website,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn page_items(ids: &[u32]) -> Vec<ListingCandidate> {
    ids.iter()
        .map(|id| {
            ListingCandidate::new(
                format!("https://www.wgzimmer.ch/wglink/de/{id}.html"),
                Website::WgZimmer,
            )
        })
        .collect()
}

/// Feeds parsed pages through the same checks a driver performs.
fn drive(pages: &[(PaginationState, Vec<ListingCandidate>)]) -> (SearchState, CandidateSet, u32) {
    let mut state = [
        SearchStep::FormReady,
        SearchStep::FormSubmitted,
        SearchStep::Settled,
        SearchStep::ResultsConfirmed,
    ]
    .into_iter()
    .fold(SearchState::Init, advance);

    let mut collected = CandidateSet::new();
    let mut known_total = None;
    let mut page = 1;
    let termination = loop {
        let (pagination, items) = &pages[page as usize - 1];
        known_total = pagination.total_pages.or(known_total);
        if let PageVerdict::Stale { expected, parsed } = check_page(page, pagination) {
            break Termination::PaginationStale { expected, parsed };
        }
        collected.extend(items.iter().cloned());
        let ctx = PageContext {
            page,
            known_total,
            pagination: *pagination,
            items,
        };
        if let Some(stop) = LastPageReached.should_stop(&ctx) {
            break stop;
        }
        state = advance(state, SearchStep::NextPageRequested);
        page += 1;
    };
    (advance(state, SearchStep::Finished(termination)), collected, page)
}

#[test]
fn three_page_run_ends_on_the_last_page() {
    init_logging();
    let pages = vec![
        (PaginationState::new(1, 3), page_items(&[1, 2, 3])),
        (PaginationState::new(2, 3), page_items(&[3, 4, 5])),
        (PaginationState::new(3, 3), page_items(&[6])),
    ];
    let (state, collected, pages_visited) = drive(&pages);

    assert_eq!(
        state,
        SearchState::Done(Termination::LastPage {
            page: 3,
            total: Some(3)
        })
    );
    assert_eq!(pages_visited, 3);
    assert_eq!(collected.len(), 6);
    assert_eq!(collected.duplicates(), 1);
}

#[test]
fn stale_second_page_keeps_only_the_first() {
    init_logging();
    let pages = vec![
        (PaginationState::new(1, 4), page_items(&[1, 2])),
        (PaginationState::new(1, 4), page_items(&[1, 2])),
    ];
    let (state, collected, _) = drive(&pages);

    assert_eq!(
        state,
        SearchState::Done(Termination::PaginationStale {
            expected: 2,
            parsed: 1
        })
    );
    assert_eq!(
        collected.urls().collect::<Vec<_>>(),
        [
            "https://www.wgzimmer.ch/wglink/de/1.html",
            "https://www.wgzimmer.ch/wglink/de/2.html"
        ]
    );
}

#[test]
fn page_without_counter_is_the_only_page() {
    init_logging();
    let pages = vec![(PaginationState::unknown(), page_items(&[7, 8]))];
    let (state, collected, pages_visited) = drive(&pages);

    assert_eq!(
        state,
        SearchState::Done(Termination::LastPage {
            page: 1,
            total: None
        })
    );
    assert_eq!(pages_visited, 1);
    assert_eq!(collected.len(), 2);
}
