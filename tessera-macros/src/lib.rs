#![allow(clippy::needless_doctest_main)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub
)]
#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]

//! Attribute macros for tessera.

mod entry;
mod parse;
mod task;

/// Turns an `async fn` into a function returning a lazily started
/// `tessera::Task`.
///
/// The body does not run when the function is called; it runs once the
/// returned task is awaited, started or joined.
///
/// - If the declared return type is a `Result<T, E>` (any path ending in
///   `Result`, e.g. `anyhow::Result<T>` or `io::Result<T>`), the task yields
///   `T` and an `Err` becomes the task's failure. `E` must convert into
///   `anyhow::Error`.
/// - Otherwise the task yields the declared type and only fails by panicking.
///
/// Arguments are moved into the task, so they must be owned (`'static`).
/// Methods may take `self` by value but not by reference.
///
/// ```
/// #[tessera::task]
/// async fn add(a: u32, b: u32) -> u32 {
///     a + b
/// }
///
/// #[tessera::task]
/// async fn fail(msg: &'static str) -> anyhow::Result<()> {
///     anyhow::bail!(msg)
/// }
///
/// assert_eq!(tessera::sync_await(add(2, 3)).unwrap(), 5);
/// assert_eq!(tessera::sync_await(fail("boom")).unwrap_err().to_string(), "boom");
/// ```
///
/// Equivalent code not using `#[tessera::task]`
///
/// ```
/// fn add(a: u32, b: u32) -> tessera::Task<u32> {
///     tessera::Task::new(async move { Ok(a + b) })
/// }
/// ```
#[proc_macro_attribute]
pub fn task(
    args: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    task::task(args.into(), item.into()).into()
}

/// Marks the async `main` function to be run on a `tessera::runtime::ThreadPool`.
///
/// This macro helps set up a pool without requiring the user to use
/// `runtime::Builder` directly. The body runs as a task bound to the pool,
/// while the real `main` thread blocks until it completes.
///
/// # Options
///
/// - `worker_threads = N`: number of workers, defaults to 4. May not be 0.
/// - `thread_name = "name"`: name of every worker thread, defaults to
///   `tessera-worker-{N}`.
///
/// # Usage
///
/// ```no_run
/// #[tessera::main(worker_threads = 2)]
/// async fn main() {
///     println!("Hello world");
/// }
/// ```
///
/// Equivalent code not using `#[tessera::main]`
///
/// ```no_run
/// fn main() {
///     tessera::runtime::Builder::new()
///         .worker_threads(2)
///         .try_build()
///         .unwrap()
///         .block_on(async {
///             println!("Hello world");
///         })
/// }
/// ```
#[proc_macro_attribute]
pub fn main(
    args: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    entry::main(args.into(), item.into()).into()
}

/// Marks an async function to be run on a fresh `tessera::runtime::ThreadPool`
/// as a test. Each test gets its own pool.
///
/// Accepts the same options as [`main`](macro@main).
///
/// ```no_run
/// #[tessera::test(worker_threads = 1)]
/// async fn my_test() -> anyhow::Result<()> {
///     assert!(true);
///     Ok(())
/// }
/// ```
///
/// Equivalent code not using `#[tessera::test]`
///
/// ```no_run
/// #[test]
/// fn my_test() -> anyhow::Result<()> {
///     tessera::runtime::Builder::new()
///         .worker_threads(1)
///         .try_build()
///         .unwrap()
///         .block_on(async {
///             assert!(true);
///             Ok(())
///         })
/// }
/// ```
#[proc_macro_attribute]
pub fn test(
    args: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    entry::test(args.into(), item.into()).into()
}
