use std::time::Instant;

const HEURISTIC_BYTES_PER_TOKEN: usize = 4;

/// Accumulates the timing and token counters spec §4.9/§8 define for one
/// request. Grounded on `RequestTimer` (pack: `rexlunae-RustyClaw::metrics`),
/// generalized from a single duration observation on `Drop` to the
/// TTFT/TPOT pair the gateway's own log row needs.
pub struct RequestMeter {
    start: Instant,
    ttft: Option<Instant>,
    output_tokens: u64,
}

impl RequestMeter {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            ttft: None,
            output_tokens: 0,
        }
    }

    /// Stamp TTFT on the first caller-visible output byte: the first
    /// `text_delta` or `tool_call_delta` after `message_start`. A no-op
    /// on every later call.
    pub fn mark_first_byte(&mut self) {
        self.ttft.get_or_insert_with(Instant::now);
    }

    /// Upstream reported its own output-token count for this chunk
    /// (e.g. a `message_delta`/`usage` event) — this is authoritative
    /// and replaces the heuristic running count.
    pub fn set_output_tokens(&mut self, reported: u64) {
        self.output_tokens = reported;
    }

    /// No usage figure was reported for this delta; fall back to
    /// `chunk length / 4` bytes-per-token, per spec §4.9.
    pub fn add_heuristic_tokens(&mut self, chunk_len: usize) {
        self.output_tokens += ((chunk_len / HEURISTIC_BYTES_PER_TOKEN).max(1)) as u64;
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }

    pub fn latency_ms(&self) -> i64 {
        self.start.elapsed().as_millis() as i64
    }

    pub fn ttft_ms(&self) -> Option<i64> {
        self.ttft
            .map(|t| t.duration_since(self.start).as_millis() as i64)
    }

    /// `(latency_ms − ttft_ms) / output_tokens`, once the body is
    /// complete and at least one output token was produced (spec §8).
    pub fn tpot_ms(&self, latency_ms: i64) -> Option<f64> {
        let ttft = self.ttft_ms()?;
        if self.output_tokens == 0 {
            return None;
        }
        Some((latency_ms - ttft) as f64 / self.output_tokens as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn ttft_never_exceeds_latency() {
        let mut meter = RequestMeter::start();
        sleep(Duration::from_millis(5));
        meter.mark_first_byte();
        sleep(Duration::from_millis(5));
        let latency = meter.latency_ms();
        assert!(meter.ttft_ms().unwrap() <= latency);
    }

    #[test]
    fn tpot_is_none_without_output_tokens() {
        let mut meter = RequestMeter::start();
        meter.mark_first_byte();
        assert_eq!(meter.tpot_ms(100), None);
    }

    #[test]
    fn tpot_matches_formula() {
        let mut meter = RequestMeter::start();
        meter.mark_first_byte();
        meter.set_output_tokens(10);
        let ttft = meter.ttft_ms().unwrap();
        let latency = ttft + 100;
        let tpot = meter.tpot_ms(latency).unwrap();
        assert!((tpot - 10.0).abs() < 1.0);
    }

    #[test]
    fn heuristic_counts_at_least_one_token_per_nonempty_chunk() {
        let mut meter = RequestMeter::start();
        meter.add_heuristic_tokens(1);
        meter.add_heuristic_tokens(3);
        assert_eq!(meter.output_tokens(), 2);
    }
}
