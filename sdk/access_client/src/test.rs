use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crate::{ClientError, GuardedCall, RejectCode, TokenCache, TokenSource};

/// Hands out sequential tokens and counts how often it was asked.
struct CountingSource {
    calls: AtomicUsize,
    next: AtomicU64,
}

impl CountingSource {
    fn starting_at(first: u64) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            next: AtomicU64::new(first),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenSource for CountingSource {
    fn fetch(&self) -> Result<u64, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// Always fails, the way a dead token endpoint would.
struct DeadSource;

impl TokenSource for DeadSource {
    fn fetch(&self) -> Result<u64, ClientError> {
        Err(ClientError::Source("endpoint unreachable".into()))
    }
}

/// Blocks inside `fetch` until the test opens the gate, so a test can pile
/// threads onto one in-flight fetch deterministically.
struct GateSource {
    calls: AtomicUsize,
    open: Mutex<bool>,
    released: Condvar,
}

impl GateSource {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            open: Mutex::new(false),
            released: Condvar::new(),
        }
    }

    fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.released.notify_all();
    }
}

impl TokenSource for GateSource {
    fn fetch(&self) -> Result<u64, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.released.wait(open).unwrap();
        }
        Ok(99)
    }
}

#[test]
fn token_is_fetched_once_and_cached() {
    let cache = TokenCache::new();
    let source = CountingSource::starting_at(7);

    assert_eq!(cache.token("consent:grant", &source), Ok(7));
    assert_eq!(cache.token("consent:grant", &source), Ok(7));
    assert_eq!(source.calls(), 1);
    assert_eq!(cache.peek("consent:grant"), Some(7));
}

#[test]
fn purposes_do_not_share_tokens() {
    let cache = TokenCache::new();
    let source = CountingSource::starting_at(1);

    assert_eq!(cache.token("consent:grant", &source), Ok(1));
    assert_eq!(cache.token("emergency:request", &source), Ok(2));
    assert_eq!(source.calls(), 2);
}

#[test]
fn invalidate_only_drops_the_rejected_token() {
    let cache = TokenCache::new();
    let source = CountingSource::starting_at(1);

    assert_eq!(cache.token("consent:grant", &source), Ok(1));
    cache.invalidate("consent:grant", 1);
    assert_eq!(cache.peek("consent:grant"), None);

    assert_eq!(cache.token("consent:grant", &source), Ok(2));
    // Stragglers invalidating the old token must not evict the fresh one.
    cache.invalidate("consent:grant", 1);
    assert_eq!(cache.peek("consent:grant"), Some(2));
    assert_eq!(cache.token("consent:grant", &source), Ok(2));
    assert_eq!(source.calls(), 2);
}

#[test]
fn source_failure_reaches_the_caller() {
    let cache = TokenCache::new();
    assert_eq!(
        cache.token("consent:grant", &DeadSource),
        Err(ClientError::Source("endpoint unreachable".into()))
    );
    // A failed fetch leaves nothing cached; the next caller tries again.
    assert_eq!(cache.peek("consent:grant"), None);

    let source = CountingSource::starting_at(5);
    assert_eq!(cache.token("consent:grant", &source), Ok(5));
}

#[test]
fn invoke_passes_the_token_to_the_operation() {
    let cache = TokenCache::new();
    let source = CountingSource::starting_at(41);

    let seen = GuardedCall::new("consent:grant")
        .invoke(&cache, &source, Ok)
        .unwrap();
    assert_eq!(seen, 41);
    assert_eq!(source.calls(), 1);
}

#[test]
fn stale_token_is_refreshed_and_retried_once() {
    let cache = TokenCache::new();
    let source = CountingSource::starting_at(1);

    // Warm the cache, then outlaw everything below token 2 server-side.
    cache.token("consent:grant", &source).unwrap();

    let mut attempts = Vec::new();
    let result = GuardedCall::new("consent:grant").invoke(&cache, &source, |token| {
        attempts.push(token);
        if token < 2 {
            Err(ClientError::TokenRejected(RejectCode::TokenStale))
        } else {
            Ok(token)
        }
    });

    assert_eq!(result, Ok(2));
    assert_eq!(attempts, vec![1, 2]);
    assert_eq!(source.calls(), 2);
}

#[test]
fn missing_token_rejection_also_triggers_the_single_retry() {
    let cache = TokenCache::new();
    let source = CountingSource::starting_at(10);

    let mut attempts = 0;
    let result = GuardedCall::new("emergency:authorize").invoke(&cache, &source, |token| {
        attempts += 1;
        if attempts == 1 {
            Err(ClientError::TokenRejected(RejectCode::TokenMissing))
        } else {
            Ok(token)
        }
    });

    assert_eq!(result, Ok(11));
    assert_eq!(attempts, 2);
}

#[test]
fn second_rejection_is_terminal() {
    let cache = TokenCache::new();
    let source = CountingSource::starting_at(1);

    let mut attempts = 0;
    let result: Result<u64, _> =
        GuardedCall::new("consent:grant").invoke(&cache, &source, |_token| {
            attempts += 1;
            Err(ClientError::TokenRejected(RejectCode::TokenStale))
        });

    assert_eq!(
        result,
        Err(ClientError::RetryExhausted(RejectCode::TokenStale))
    );
    // Exactly one retry: initial attempt plus one more, never a third.
    assert_eq!(attempts, 2);
    assert_eq!(source.calls(), 2);
}

#[test]
fn non_token_failures_are_not_retried() {
    let cache = TokenCache::new();
    let source = CountingSource::starting_at(1);

    let mut attempts = 0;
    let result: Result<u64, _> =
        GuardedCall::new("consent:grant").invoke(&cache, &source, |_token| {
            attempts += 1;
            Err(ClientError::Operation("grant conflicts".into()))
        });

    assert_eq!(result, Err(ClientError::Operation("grant conflicts".into())));
    assert_eq!(attempts, 1);
    assert_eq!(source.calls(), 1);
    // The token was not blamed, so it stays cached.
    assert_eq!(cache.peek("consent:grant"), Some(1));
}

#[test]
fn refresh_failure_surfaces_as_source_error() {
    let cache = TokenCache::new();
    let source = CountingSource::starting_at(1);
    cache.token("consent:grant", &source).unwrap();

    // Token rejected, but the endpoint is down for the refresh.
    let result: Result<u64, _> =
        GuardedCall::new("consent:grant").invoke(&cache, &DeadSource, |_token| {
            Err(ClientError::TokenRejected(RejectCode::TokenStale))
        });

    assert_eq!(
        result,
        Err(ClientError::Source("endpoint unreachable".into()))
    );
}

#[test]
fn racing_refreshers_share_one_fetch() {
    let cache = Arc::new(TokenCache::new());
    let source = Arc::new(GateSource::new());
    let arrivals = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        let source = Arc::clone(&source);
        let arrivals = Arc::clone(&arrivals);
        handles.push(thread::spawn(move || {
            arrivals.fetch_add(1, Ordering::SeqCst);
            cache.token("emergency:authorize", source.as_ref())
        }));
    }

    // Hold the gate until every thread is in play, so all eight demand a
    // token while at most one fetch can be in flight.
    while arrivals.load(Ordering::SeqCst) < 8 {
        thread::yield_now();
    }
    thread::sleep(Duration::from_millis(20));
    source.release();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), Ok(99));
    }
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn rejected_burst_coalesces_on_one_refresh() {
    let cache = Arc::new(TokenCache::new());
    let source = Arc::new(CountingSource::starting_at(1));

    // Everyone starts from cached token 1; the server only accepts 2+.
    cache.token("consent:grant", source.as_ref()).unwrap();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let cache = Arc::clone(&cache);
        let source = Arc::clone(&source);
        handles.push(thread::spawn(move || {
            GuardedCall::new("consent:grant").invoke(cache.as_ref(), source.as_ref(), |token| {
                if token < 2 {
                    Err(ClientError::TokenRejected(RejectCode::TokenStale))
                } else {
                    Ok(token)
                }
            })
        }));
    }

    for handle in handles {
        assert_eq!(handle.join().unwrap(), Ok(2));
    }
    // Warm-up fetch plus exactly one shared refresh for the whole burst.
    assert_eq!(source.calls(), 2);
}

#[test]
fn error_messages_carry_the_reject_label() {
    let err = ClientError::TokenRejected(RejectCode::TokenMissing);
    assert_eq!(err.to_string(), "request token rejected: token-missing");

    let err = ClientError::RetryExhausted(RejectCode::TokenStale);
    assert_eq!(
        err.to_string(),
        "request token rejected after refresh: token-stale"
    );
}
