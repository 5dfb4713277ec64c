use crate::wrapping::Wrapping32;

/// A timestamp-indexed jitter buffer for RTP audio.
///
/// The buffer holds `frame_count` frames of `stride` bytes each. A frame
/// with RTP timestamp `t` lives at slot `t % frame_count`, so writes
/// land wherever the packet's timestamp says, independent of arrival
/// order. `next_ts` is one past the newest frame written; the valid
/// window is the `frame_count` frames before it, everything else reads
/// as the ground value (silence).
///
/// # Test
///
/// ```
/// use ravennakit_service::rtp::Ringbuffer;
///
/// let mut buffer = Ringbuffer::default();
/// buffer.resize(4, 2);
///
/// buffer.write(2, &[1, 2, 3, 4, 5, 6, 7, 8]);
/// assert_eq!(buffer.next_ts(), Some(6));
///
/// let mut out = [0u8; 8];
/// buffer.read(2, &mut out, false);
/// assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct Ringbuffer {
    data: Vec<u8>,
    frame_count: usize,
    stride: usize,
    ground_value: u8,
    next_ts: Option<Wrapping32>,
}

impl Ringbuffer {
    /// Allocates the buffer for the given number of frames and bytes
    /// per frame, clears it to the ground value and forgets the write
    /// position.
    pub fn resize(&mut self, frame_count: usize, stride: usize) {
        assert!(frame_count > 0, "ring buffer frame count must be non-zero");
        assert!(stride > 0, "ring buffer stride must be non-zero");

        self.frame_count = frame_count;
        self.stride = stride;
        self.data.clear();
        self.data.resize(frame_count * stride, self.ground_value);
        self.next_ts = None;
    }

    /// Sets the byte used to fill unwritten and erased frames.
    pub fn set_ground_value(&mut self, value: u8) {
        self.ground_value = value;
    }

    /// One past the timestamp of the newest frame written, or `None`
    /// before the first write.
    pub fn next_ts(&self) -> Option<u32> {
        self.next_ts.map(|ts| ts.value())
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Writes payload frames at the given timestamp. The payload length
    /// must be a multiple of the stride; a trailing partial frame is
    /// dropped. Frames older than the valid window are discarded so they
    /// cannot overwrite newer audio occupying the same slots.
    pub fn write(&mut self, ts: u32, payload: &[u8]) {
        assert!(self.stride > 0, "ring buffer not sized");

        let frames = payload.len() / self.stride;
        if frames == 0 {
            return;
        }

        let next_ts = self
            .next_ts
            .get_or_insert_with(|| Wrapping32::new(ts.wrapping_add(frames as u32)));

        // Skip leading frames that fall before the valid window.
        let mut skip = 0usize;
        while skip < frames {
            let age = next_ts.value().wrapping_sub(ts.wrapping_add(skip as u32));
            if age as usize <= self.frame_count || age >= u32::MAX / 2 {
                break; // Inside the window, or in the future
            }
            skip += 1;
        }

        // A payload larger than the whole ring only keeps its newest
        // frames; the earlier ones would be overwritten immediately.
        if frames - skip > self.frame_count {
            skip = frames - self.frame_count;
        }

        if skip == frames {
            return; // The whole packet is too old
        }

        let first_ts = ts.wrapping_add(skip as u32);
        let count = frames - skip;
        let slot = first_ts as usize % self.frame_count;
        let payload = &payload[skip * self.stride..(skip + count) * self.stride];

        // Copy in up to two contiguous spans, wrapping at the end of the
        // buffer.
        let first_span = (self.frame_count - slot).min(count) * self.stride;
        let offset = slot * self.stride;
        self.data[offset..offset + first_span].copy_from_slice(&payload[..first_span]);
        if first_span < payload.len() {
            self.data[..payload.len() - first_span].copy_from_slice(&payload[first_span..]);
        }

        let end_ts = ts.wrapping_add(frames as u32);
        if Wrapping32::new(end_ts) > *next_ts {
            next_ts.set(end_ts);
        }
    }

    /// Reads frames starting at the given timestamp into `out`. Frames
    /// outside the valid window are filled with the ground value. With
    /// `erase` set, frames that were read from the ring are overwritten
    /// with the ground value, so a second read returns silence.
    pub fn read(&mut self, ts: u32, out: &mut [u8], erase: bool) {
        assert!(self.stride > 0, "ring buffer not sized");

        let frames = out.len() / self.stride;

        for i in 0..frames {
            let frame_ts = ts.wrapping_add(i as u32);
            let dst = &mut out[i * self.stride..(i + 1) * self.stride];

            if !self.contains(frame_ts) {
                dst.fill(self.ground_value);
                continue;
            }

            let offset = (frame_ts as usize % self.frame_count) * self.stride;
            dst.copy_from_slice(&self.data[offset..offset + self.stride]);

            if erase {
                self.data[offset..offset + self.stride].fill(self.ground_value);
            }
        }
    }

    /// Fills every frame from `next_ts` up to the given timestamp with
    /// the ground value and moves `next_ts` there. Returns false without
    /// doing anything when the timestamp is not ahead of `next_ts`. A
    /// gap larger than the buffer resets the whole ring.
    pub fn clear_until(&mut self, ts: u32) -> bool {
        let Some(next_ts) = &mut self.next_ts else {
            self.next_ts = Some(Wrapping32::new(ts));
            return true;
        };

        if Wrapping32::new(ts) <= *next_ts {
            return false;
        }

        let gap = ts.wrapping_sub(next_ts.value()) as usize;
        let count = gap.min(self.frame_count);
        let start = next_ts.value().wrapping_add((gap - count) as u32);

        for i in 0..count {
            let slot = (start.wrapping_add(i as u32)) as usize % self.frame_count;
            let offset = slot * self.stride;
            self.data[offset..offset + self.stride].fill(self.ground_value);
        }

        next_ts.set(ts);
        true
    }

    /// Whether a write of `frames` frames at the given timestamp would
    /// be discarded entirely because it ends before the valid window.
    /// The receive path uses this to classify arrivals as too late.
    pub fn too_old(&self, ts: u32, frames: usize) -> bool {
        let Some(next_ts) = self.next_ts else {
            return false;
        };

        let end = ts.wrapping_add(frames as u32);
        let age = next_ts.value().wrapping_sub(end);
        (age as usize) >= self.frame_count && age < u32::MAX / 2
    }

    /// Whether the frame at the given timestamp is inside the valid
    /// window `[next_ts - frame_count, next_ts)`.
    fn contains(&self, frame_ts: u32) -> bool {
        let Some(next_ts) = self.next_ts else {
            return false;
        };

        let age = next_ts.value().wrapping_sub(frame_ts);
        age >= 1 && age as usize <= self.frame_count
    }
}
