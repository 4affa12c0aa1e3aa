use std::future::Future;

pub mod build;
pub mod watch;

/// Exit status when the operator stops the process with Ctrl-C.
pub const INTERRUPTED_EXIT_CODE: u8 = 2;

/// How a piece of work ended when raced against Ctrl-C.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    Done(T),
    Interrupted,
}

/// Drive `work` until it finishes or `interrupt` fires, whichever is first.
pub async fn until_interrupted<W, I>(work: W, interrupt: I) -> Outcome<W::Output>
where
    W: Future,
    I: Future,
{
    tokio::select! {
        done = work => Outcome::Done(done),
        _ = interrupt => Outcome::Interrupted,
    }
}

/// Leave immediately with [`INTERRUPTED_EXIT_CODE`].
///
/// A pass running on a blocking thread cannot be cancelled, and the runtime
/// would wait for it on shutdown, so the process exits here instead of
/// returning through `main`.
pub fn exit_interrupted() -> ! {
    tracing::info!("Interrupted, shutting down");
    std::process::exit(INTERRUPTED_EXIT_CODE.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_interrupt_does_not_wait_for_blocking_pass() {
        let (release, blocked) = std::sync::mpsc::channel::<()>();
        let pass = tokio::task::spawn_blocking(move || blocked.recv().is_ok());

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            until_interrupted(pass, std::future::ready(())),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, Outcome::Interrupted));
        release.send(()).unwrap();
    }

    #[tokio::test]
    async fn test_finished_work_is_returned() {
        let outcome = until_interrupted(async { 7 }, std::future::pending::<()>()).await;
        assert_eq!(outcome, Outcome::Done(7));
    }
}
