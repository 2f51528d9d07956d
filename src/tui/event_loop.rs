use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::events::{LoopEvent, ScreenSize};
use super::handler::{enter, ActiveSession, Context, Handler, HandlerError, WriteScheduler};
use super::images::ImageManager;
use super::term_manager::TermManager;

/// Drives one handler: owns its context and the queue of pending output.
pub struct EventLoop<A> {
    cx: Context<A>,
    output_rx: mpsc::UnboundedReceiver<Bytes>,
}

impl<A: Clone> EventLoop<A> {
    pub fn new(term: TermManager, screen_size: ScreenSize) -> Self {
        let (writer, output_rx) = WriteScheduler::channel();
        Self {
            cx: Context::new(screen_size, writer, term),
            output_rx,
        }
    }

    pub fn with_image_manager(mut self, images: impl ImageManager + 'static) -> Self {
        self.cx = self.cx.with_image_manager(images);
        self
    }

    /// The handler's context, for setup done before [`EventLoop::run`]
    /// (shortcuts, for example).
    pub fn context_mut(&mut self) -> &mut Context<A> {
        &mut self.cx
    }

    /// Run `handler` until it asks to quit or `events` ends.
    ///
    /// The terminal is put in interactive mode first and restored last. After
    /// every dispatched event the pending output is flushed to `output` and
    /// the quit flag is checked. Returns the handler's return code.
    pub async fn run<H, S, W>(
        mut self,
        handler: &mut H,
        events: S,
        output: &mut W,
    ) -> Result<i32, HandlerError>
    where
        H: Handler<Action = A>,
        S: Stream<Item = LoopEvent> + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.cx.term.start()?;
        let result = self.run_session(handler, events, output).await;
        let stopped = self.cx.term.stop();
        let code = result?;
        stopped?;
        Ok(code)
    }

    async fn run_session<H, S, W>(
        &mut self,
        handler: &mut H,
        events: S,
        output: &mut W,
    ) -> Result<i32, HandlerError>
    where
        H: Handler<Action = A>,
        S: Stream<Item = LoopEvent> + Unpin,
        W: AsyncWrite + Unpin,
    {
        let Self { cx, output_rx } = self;
        let entered = enter(handler, cx);
        // Setup may have written before failing.
        let flushed = flush(output_rx, output).await;
        let mut session = entered?;
        flushed?;

        let outcome = pump(&mut session, events, output_rx, output).await;
        let exited = session.exit();
        let flushed = flush(output_rx, output).await;

        let code = outcome?;
        exited?;
        flushed?;
        tracing::debug!(code, "event loop finished");
        Ok(code)
    }
}

async fn pump<H, S, W>(
    session: &mut ActiveSession<'_, H>,
    mut events: S,
    output_rx: &mut mpsc::UnboundedReceiver<Bytes>,
    output: &mut W,
) -> Result<i32, HandlerError>
where
    H: Handler,
    S: Stream<Item = LoopEvent> + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        if session.context().quit_requested() {
            return Ok(session.context().return_code());
        }
        let Some(event) = events.next().await else {
            tracing::debug!("event stream ended");
            return Ok(session.context().return_code());
        };
        tracing::trace!(?event, "dispatching event");
        session.dispatch(event);
        flush(output_rx, output).await?;
    }
}

async fn flush<W: AsyncWrite + Unpin>(
    output_rx: &mut mpsc::UnboundedReceiver<Bytes>,
    output: &mut W,
) -> std::io::Result<()> {
    let mut wrote = false;
    while let Ok(chunk) = output_rx.try_recv() {
        output.write_all(&chunk).await?;
        wrote = true;
    }
    if wrote {
        output.flush().await?;
    }
    Ok(())
}
