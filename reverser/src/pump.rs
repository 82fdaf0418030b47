/*!
    Driving a [`Codec`] through feed, drain and finish.
*/

use std::time::Duration;

use media_types::{Codec, CodecEvent, FeedStatus, StreamDescriptor};

use crate::{CancelFlag, Result};

/**
    What a codec hands back to its caller.
*/
#[derive(Debug)]
pub enum Emitted<T> {
    Format(StreamDescriptor),
    Sample(T),
}

/**
    Moves data through one codec, delivering every announcement and output
    to a sink closure in the order the codec produced them.
*/
pub struct Pump<'a, C: Codec> {
    codec: &'a mut C,
    timeout: Duration,
    cancel: &'a CancelFlag,
}

impl<'a, C: Codec> Pump<'a, C> {
    pub fn new(codec: &'a mut C, timeout: Duration, cancel: &'a CancelFlag) -> Self {
        Self {
            codec,
            timeout,
            cancel,
        }
    }

    /**
        Offer one input until the codec accepts it, then collect whatever
        output is ready.
    */
    pub fn feed<F>(&mut self, input: &C::Input, sink: &mut F) -> Result<()>
    where
        F: FnMut(Emitted<C::Output>) -> Result<()>,
    {
        loop {
            self.cancel.check()?;
            match self.codec.feed(input)? {
                FeedStatus::Accepted => return self.drain(sink),
                FeedStatus::Busy => {
                    self.poll_once(sink)?;
                }
            }
        }
    }

    /// Collect output until the codec has nothing ready.
    pub fn drain<F>(&mut self, sink: &mut F) -> Result<()>
    where
        F: FnMut(Emitted<C::Output>) -> Result<()>,
    {
        while self.poll_once(sink)? {}
        Ok(())
    }

    /**
        Signal end of input and collect output until the codec reports end
        of stream.
    */
    pub fn finish<F>(&mut self, sink: &mut F) -> Result<()>
    where
        F: FnMut(Emitted<C::Output>) -> Result<()>,
    {
        self.codec.signal_end_of_input()?;
        loop {
            self.cancel.check()?;
            match self.codec.poll(self.timeout)? {
                CodecEvent::FormatChanged(descriptor) => sink(Emitted::Format(descriptor))?,
                CodecEvent::Sample(output) => sink(Emitted::Sample(output))?,
                CodecEvent::TryAgain => {}
                CodecEvent::EndOfStream => return Ok(()),
            }
        }
    }

    /// Returns false when the codec had nothing to give.
    fn poll_once<F>(&mut self, sink: &mut F) -> Result<bool>
    where
        F: FnMut(Emitted<C::Output>) -> Result<()>,
    {
        match self.codec.poll(self.timeout)? {
            CodecEvent::FormatChanged(descriptor) => sink(Emitted::Format(descriptor))?,
            CodecEvent::Sample(output) => sink(Emitted::Sample(output))?,
            CodecEvent::TryAgain => return Ok(false),
            CodecEvent::EndOfStream => {
                return Err(media_types::Error::codec(
                    "end of stream reported before end of input",
                )
                .into());
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::VecDeque;
    use std::time::Duration;

    use media_types::{
        AudioParams, Codec, CodecEvent, CodecId, CodecState, FeedStatus, FormatGate, Lifecycle,
        MediaParams, Rational, Result, StreamDescriptor,
    };

    /**
        Doubles its input. Holds at most `capacity` inputs and answers every
        other poll with `TryAgain`, so callers have to loop.
    */
    pub struct Doubler {
        pub lifecycle: Lifecycle,
        gate: FormatGate<u32>,
        queue: VecDeque<u32>,
        capacity: usize,
        tick: bool,
    }

    impl Doubler {
        pub fn new(capacity: usize) -> Self {
            Self {
                lifecycle: Lifecycle::new("doubler"),
                gate: FormatGate::new(),
                queue: VecDeque::new(),
                capacity,
                tick: false,
            }
        }
    }

    pub fn descriptor() -> StreamDescriptor {
        StreamDescriptor {
            codec_id: CodecId::Raw,
            time_base: Rational::MICROS,
            duration: None,
            bit_rate: None,
            extradata: None,
            media: MediaParams::Audio(AudioParams {
                sample_rate: 8_000,
                channels: 1,
                sample_format: None,
                priming: 0,
            }),
        }
    }

    impl Codec for Doubler {
        type Input = u32;
        type Output = u32;

        fn state(&self) -> CodecState {
            self.lifecycle.state()
        }

        fn start(&mut self) -> Result<()> {
            self.lifecycle.start()
        }

        fn feed(&mut self, input: &u32) -> Result<FeedStatus> {
            self.lifecycle.ensure("feed", &[CodecState::Started])?;
            if self.queue.len() >= self.capacity {
                return Ok(FeedStatus::Busy);
            }
            self.queue.push_back(input * 2);
            Ok(FeedStatus::Accepted)
        }

        fn signal_end_of_input(&mut self) -> Result<()> {
            self.lifecycle.end_input()
        }

        fn poll(&mut self, _timeout: Duration) -> Result<CodecEvent<u32>> {
            self.lifecycle
                .ensure("poll", &[CodecState::Started, CodecState::Draining])?;
            if let Some(value) = self.gate.take_stashed() {
                return Ok(CodecEvent::Sample(value));
            }
            self.tick = !self.tick;
            if self.tick {
                return Ok(CodecEvent::TryAgain);
            }
            match self.queue.pop_front() {
                Some(value) => Ok(self.gate.admit(value, |_| descriptor())),
                None if self.lifecycle.state() == CodecState::Draining => {
                    Ok(CodecEvent::EndOfStream)
                }
                None => Ok(CodecEvent::TryAgain),
            }
        }

        fn stop(&mut self) -> Result<()> {
            self.lifecycle.stop()
        }

        fn release(&mut self) {
            self.lifecycle.release();
        }
    }
}
