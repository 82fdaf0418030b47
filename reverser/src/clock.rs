/*!
    Presentation timestamps for produced frames.
*/

use std::time::Instant;

use media_types::Rational;

use crate::Pacing;

/**
    Hands out the position of each produced frame, in microseconds.
    Positions start at zero and strictly increase.
*/
pub trait PresentationClock {
    fn next_position(&mut self) -> i64;
}

/**
    Advances by exactly one frame interval per frame, so the number of
    frames produced for a duration is deterministic.
*/
#[derive(Clone, Debug)]
pub struct FrameRateClock {
    frame_duration: Rational,
    index: i64,
}

impl FrameRateClock {
    pub fn new(frame_rate: Rational) -> Self {
        Self {
            frame_duration: frame_rate.invert(),
            index: 0,
        }
    }
}

impl PresentationClock for FrameRateClock {
    fn next_position(&mut self) -> i64 {
        let position = Rational::rescale(self.index, self.frame_duration, Rational::MICROS);
        self.index += 1;
        position
    }
}

/**
    Stamps each frame with the time elapsed since the first one. Frames
    produced within the same microsecond are nudged forward by one.
*/
#[derive(Clone, Debug, Default)]
pub struct WallClock {
    start: Option<Instant>,
    last: Option<i64>,
}

impl WallClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresentationClock for WallClock {
    fn next_position(&mut self) -> i64 {
        let start = *self.start.get_or_insert_with(Instant::now);
        let elapsed = start.elapsed().as_micros() as i64;
        let position = match self.last {
            Some(last) if elapsed <= last => last + 1,
            _ => elapsed,
        };
        self.last = Some(position);
        position
    }
}

pub fn for_pacing(pacing: Pacing, frame_rate: Rational) -> Box<dyn PresentationClock + Send> {
    match pacing {
        Pacing::FrameRate => Box::new(FrameRateClock::new(frame_rate)),
        Pacing::WallClock => Box::new(WallClock::new()),
    }
}

impl<C: PresentationClock + ?Sized> PresentationClock for Box<C> {
    fn next_position(&mut self) -> i64 {
        (**self).next_position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rate_clock_steps_by_frame_interval() {
        let mut clock = FrameRateClock::new(Rational::new(30, 1));
        let positions: Vec<i64> = (0..4).map(|_| clock.next_position()).collect();
        assert_eq!(positions, [0, 33_333, 66_667, 100_000]);

        let mut ntsc = FrameRateClock::new(Rational::new(30_000, 1001));
        ntsc.next_position();
        assert_eq!(ntsc.next_position(), 33_367);
    }

    #[test]
    fn wall_clock_starts_at_zero_and_strictly_increases() {
        let mut clock = WallClock::new();
        let first = clock.next_position();
        assert!(first < 1_000);
        let mut last = first;
        for _ in 0..1_000 {
            let next = clock.next_position();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn pacing_selects_clock() {
        let mut clock = for_pacing(Pacing::FrameRate, Rational::new(25, 1));
        clock.next_position();
        assert_eq!(clock.next_position(), 40_000);
    }
}
