// tests/pool.rs
//
// Pool contract: one result per input regardless of failures, fault
// isolation, deterministic single-worker mode, cancellation, throttling.

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use card_scrape::data::{CardLink, CardRecord};
use card_scrape::error::ScrapeError;
use card_scrape::pool::{CancelHandle, Pool, PoolConfig};

fn link(i: usize) -> CardLink {
    CardLink {
        url: format!("https://wiki.example/some-game/{}", 9000 + i),
        event_name: if i % 2 == 0 { "even".into() } else { "odd".into() },
        date_hint: None,
    }
}

fn links(n: usize) -> Vec<CardLink> {
    (0..n).map(link).collect()
}

fn record_for(l: &CardLink) -> CardRecord {
    CardRecord {
        name: format!("card {}", l.url),
        source_event: l.event_name.clone(),
        ..Default::default()
    }
}

fn quick_pool(workers: usize) -> Pool {
    Pool::new(PoolConfig { workers, min_request_interval: Duration::ZERO })
}

#[test]
fn one_result_per_input_despite_failures() {
    let inputs = links(20);
    let results = quick_pool(4).run(
        inputs.clone(),
        |l| {
            // every 3rd page is gone, every 7th malformed
            let id: usize = l.url.rsplit('/').next().unwrap().parse().unwrap();
            if id % 3 == 0 {
                Err(ScrapeError::not_found(&l.url))
            } else if id % 7 == 0 {
                Err(ScrapeError::parse(&l.url, "bad layout"))
            } else {
                Ok(record_for(l))
            }
        },
        None,
    );

    assert_eq!(results.len(), inputs.len());

    // every input appears exactly once, carried by its link
    let in_urls: BTreeSet<&str> = inputs.iter().map(|l| l.url.as_str()).collect();
    let out_urls: BTreeSet<&str> = results.iter().map(|(l, _)| l.url.as_str()).collect();
    assert_eq!(in_urls, out_urls);
}

#[test]
fn one_malformed_page_does_not_sink_siblings() {
    let inputs = links(10);
    let bad = inputs[4].url.clone();
    let results = quick_pool(4).run(
        inputs,
        |l| {
            if l.url == bad {
                Err(ScrapeError::parse(&l.url, "garbage"))
            } else {
                Ok(record_for(l))
            }
        },
        None,
    );

    let ok = results.iter().filter(|(_, r)| r.is_ok()).count();
    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    assert_eq!((ok, failed), (9, 1));
}

#[test]
fn single_and_multi_worker_agree_on_the_result_set() {
    let fetch = |l: &CardLink| {
        let id: usize = l.url.rsplit('/').next().unwrap().parse().unwrap();
        if id % 4 == 0 { Err(ScrapeError::not_found(&l.url)) } else { Ok(record_for(l)) }
    };

    let serial = quick_pool(1).run(links(17), fetch, None);
    let parallel = quick_pool(8).run(links(17), fetch, None);

    let ok_set = |rs: &[(CardLink, Result<CardRecord, ScrapeError>)]| -> BTreeSet<String> {
        rs.iter()
            .filter_map(|(_, r)| r.as_ref().ok().map(|c| c.name.clone()))
            .collect()
    };
    let err_set = |rs: &[(CardLink, Result<CardRecord, ScrapeError>)]| -> BTreeSet<String> {
        rs.iter()
            .filter(|(_, r)| r.is_err())
            .map(|(l, _)| l.url.clone())
            .collect()
    };

    assert_eq!(ok_set(&serial), ok_set(&parallel));
    assert_eq!(err_set(&serial), err_set(&parallel));
}

#[test]
fn single_worker_mode_preserves_submission_order() {
    let inputs = links(12);
    let results = quick_pool(1).run(inputs.clone(), |l| Ok(record_for(l)), None);

    let out: Vec<&str> = results.iter().map(|(l, _)| l.url.as_str()).collect();
    let expected: Vec<&str> = inputs.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(out, expected);
}

#[test]
fn cancellation_stops_dispatching_new_work() {
    let cancel = CancelHandle::new();
    let pool = Pool::with_cancel(
        PoolConfig { workers: 1, min_request_interval: Duration::ZERO },
        cancel.clone(),
    );

    let calls = AtomicUsize::new(0);
    let results = pool.run(
        links(50),
        |l| {
            if calls.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                cancel.cancel();
            }
            Ok(record_for(l))
        },
        None,
    );

    // the in-flight item finishes; nothing new is started afterwards
    assert_eq!(results.len(), 3);
    assert!(!results.is_empty());
}

#[test]
fn pre_cancelled_pool_starts_nothing() {
    let cancel = CancelHandle::new();
    cancel.cancel();
    let pool = Pool::with_cancel(
        PoolConfig { workers: 4, min_request_interval: Duration::ZERO },
        cancel,
    );

    let results = pool.run(links(10), |l| Ok(record_for(l)), None);
    assert!(results.is_empty());
}

#[test]
fn dispatches_respect_the_shared_interval() {
    let interval = Duration::from_millis(50);
    let pool = Pool::new(PoolConfig { workers: 3, min_request_interval: interval });

    let stamps: Mutex<Vec<Instant>> = Mutex::new(Vec::new());
    let _ = pool.run(
        links(6),
        |l| {
            stamps.lock().unwrap().push(Instant::now());
            Ok(record_for(l))
        },
        None,
    );

    let mut stamps = stamps.into_inner().unwrap();
    stamps.sort();
    for pair in stamps.windows(2) {
        // allow generous scheduler slack below the nominal 50ms
        assert!(pair[1] - pair[0] >= Duration::from_millis(30), "dispatches too close together");
    }
}
