/*!
    The pull-based codec contract shared by decoders and encoders.

    A codec is configured on construction, then driven by alternating
    [`Codec::feed`] and [`Codec::poll`] calls:

    ```text
    Configured --start--> Started --signal_end_of_input--> Draining
         |                   |                                |
         +-------------------+------------stop----------------+--> Stopped --release--> Released
    ```

    `poll` announces the authoritative output format with
    [`CodecEvent::FormatChanged`] before the first sample, and reports
    [`CodecEvent::EndOfStream`] only after end of input was signalled and all
    buffered output has drained. Callers must keep polling until they observe
    it; there is no fixed number of iterations after which output is complete.
*/

use std::collections::VecDeque;
use std::time::Duration;

use crate::{Error, Result, StreamDescriptor};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecState {
    Configured,
    Started,
    Draining,
    Stopped,
    Released,
}

/**
    Result of offering one input chunk to a codec.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedStatus {
    Accepted,
    /// The codec cannot take more input until some output is polled.
    /// The same input must be offered again.
    Busy,
}

/**
    Result of one `poll`.
*/
#[derive(Debug)]
pub enum CodecEvent<T> {
    Sample(T),
    FormatChanged(StreamDescriptor),
    TryAgain,
    EndOfStream,
}

impl<T> CodecEvent<T> {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

pub trait Codec {
    type Input;
    type Output;

    fn state(&self) -> CodecState;

    /// Configured -> Started.
    fn start(&mut self) -> Result<()>;

    /// Offer one input chunk. Valid only while Started.
    fn feed(&mut self, input: &Self::Input) -> Result<FeedStatus>;

    /// Started -> Draining. No more input follows.
    fn signal_end_of_input(&mut self) -> Result<()>;

    /**
        Pull the next event. Valid while Started or Draining.

        `timeout` bounds how long an implementation may wait for output;
        implementations backed by a non-blocking library return immediately.
    */
    fn poll(&mut self, timeout: Duration) -> Result<CodecEvent<Self::Output>>;

    fn stop(&mut self) -> Result<()>;

    /// Release underlying resources. Idempotent; every other call fails afterwards.
    fn release(&mut self);
}

/**
    State tracker that codec implementations embed to enforce the lifecycle.
*/
#[derive(Clone, Debug)]
pub struct Lifecycle {
    component: &'static str,
    state: CodecState,
}

impl Lifecycle {
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            state: CodecState::Configured,
        }
    }

    pub fn state(&self) -> CodecState {
        self.state
    }

    /**
        Fail with an invalid-state error unless the current state is one of `allowed`.
    */
    pub fn ensure(&self, operation: &'static str, allowed: &[CodecState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::invalid_state(self.component, operation, self.state))
        }
    }

    pub fn start(&mut self) -> Result<()> {
        self.ensure("start", &[CodecState::Configured])?;
        self.state = CodecState::Started;
        Ok(())
    }

    pub fn end_input(&mut self) -> Result<()> {
        self.ensure("signal_end_of_input", &[CodecState::Started])?;
        self.state = CodecState::Draining;
        Ok(())
    }

    /// Discard buffered data and accept input again (used after a seek).
    pub fn reset(&mut self) -> Result<()> {
        self.ensure("reset", &[CodecState::Started, CodecState::Draining])?;
        self.state = CodecState::Started;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.ensure(
            "stop",
            &[
                CodecState::Configured,
                CodecState::Started,
                CodecState::Draining,
                CodecState::Stopped,
            ],
        )?;
        self.state = CodecState::Stopped;
        Ok(())
    }

    pub fn release(&mut self) {
        self.state = CodecState::Released;
    }

    pub fn is_released(&self) -> bool {
        self.state == CodecState::Released
    }
}

/**
    Holds back the first output of a codec so that its format can be
    announced with [`CodecEvent::FormatChanged`] first.
*/
#[derive(Debug)]
pub struct FormatGate<T> {
    announced: bool,
    stashed: VecDeque<T>,
}

impl<T> Default for FormatGate<T> {
    fn default() -> Self {
        Self {
            announced: false,
            stashed: VecDeque::new(),
        }
    }
}

impl<T> FormatGate<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_announced(&self) -> bool {
        self.announced
    }

    /// Next held-back output, if any.
    pub fn take_stashed(&mut self) -> Option<T> {
        self.stashed.pop_front()
    }

    /**
        Route a freshly produced output. The first one is held back and its
        format returned; later ones pass straight through.
    */
    pub fn admit(
        &mut self,
        output: T,
        describe: impl FnOnce(&T) -> StreamDescriptor,
    ) -> CodecEvent<T> {
        if self.announced {
            return CodecEvent::Sample(output);
        }
        self.announced = true;
        let descriptor = describe(&output);
        self.stashed.push_back(output);
        CodecEvent::FormatChanged(descriptor)
    }

    /// Hold an extra output to be delivered before anything already held.
    pub fn hold_front(&mut self, output: T) {
        self.stashed.push_front(output);
    }

    /// Drop held-back outputs. The format stays announced.
    pub fn clear(&mut self) {
        self.stashed.clear();
    }
}
