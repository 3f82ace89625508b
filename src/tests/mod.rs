mod session_flow;

/// Runs `test` on a thread with the same stack the binary gives its session,
/// so deep-nesting checks do not depend on the test harness's thread size.
pub(crate) fn with_session_stack<T: Send + 'static>(test: impl FnOnce() -> T + Send + 'static) -> T {
    std::thread::Builder::new()
        .stack_size(32 * 1024 * 1024)
        .spawn(test)
        .expect("spawn test thread")
        .join()
        .expect("test thread panicked")
}
