// Frame render/present state machine
//
// Two states: the swapchain is either usable or waiting to be rebuilt.
// A rebuild request (resize event, OUT_OF_DATE/SUBOPTIMAL from acquire or
// present) is honoured at the top of the next iteration, once, and only when
// the window has a non-zero size. Presentation never happens while a rebuild
// is pending.
//
// ITERATION:
// ┌──────────────────────────────────────────────────────────────────────┐
// │  prepare: rebuild? ─> (UI frame) ─> submit: render ─> present         │
// └──────────────────────────────────────────────────────────────────────┘

use anyhow::Result;
use ash::vk;

pub use crate::backend::swapchain::FrameStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    Ready,
    NeedsRebuild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// Acquire reported the swapchain stale; nothing was submitted
    Aborted,
    /// Rendered but not presented because a rebuild is pending
    PresentSkipped,
}

/// Whatever owns the swapchain and knows how to record one frame.
pub trait FrameTarget {
    type DrawData: ?Sized;

    /// Recreate the swapchain at `extent`. Only called with a non-zero extent.
    fn rebuild(&mut self, extent: vk::Extent2D) -> Result<()>;

    /// Acquire, record `draw_data`, submit.
    fn render(&mut self, draw_data: &Self::DrawData) -> Result<FrameStatus>;

    fn present(&mut self) -> Result<FrameStatus>;
}

#[derive(Debug)]
pub struct FrameLoop {
    state: SwapchainState,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            state: SwapchainState::Ready,
        }
    }

    pub fn state(&self) -> SwapchainState {
        self.state
    }

    pub fn request_rebuild(&mut self) {
        if self.state != SwapchainState::NeedsRebuild {
            log::debug!("Swapchain rebuild requested");
        }
        self.state = SwapchainState::NeedsRebuild;
    }

    /// A resize to a window with area makes the swapchain stale.
    /// Zero-sized resizes (minimize) change nothing.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.request_rebuild();
        }
    }

    /// Top of the iteration. Returns true if the swapchain was rebuilt.
    ///
    /// A zero-sized (minimized) window keeps the request pending.
    pub fn prepare<T: FrameTarget + ?Sized>(
        &mut self,
        target: &mut T,
        window_extent: vk::Extent2D,
    ) -> Result<bool> {
        if self.state != SwapchainState::NeedsRebuild {
            return Ok(false);
        }
        if window_extent.width == 0 || window_extent.height == 0 {
            return Ok(false);
        }

        log::info!(
            "Rebuilding swapchain at {}x{}",
            window_extent.width,
            window_extent.height
        );
        target.rebuild(window_extent)?;
        self.state = SwapchainState::Ready;
        Ok(true)
    }

    /// Render one frame and present it unless the swapchain went stale.
    pub fn submit<T: FrameTarget + ?Sized>(
        &mut self,
        target: &mut T,
        draw_data: &T::DrawData,
    ) -> Result<FrameOutcome> {
        if target.render(draw_data)? == FrameStatus::OutOfDate {
            self.request_rebuild();
            return Ok(FrameOutcome::Aborted);
        }

        if self.state == SwapchainState::NeedsRebuild {
            return Ok(FrameOutcome::PresentSkipped);
        }

        if target.present()? == FrameStatus::OutOfDate {
            self.request_rebuild();
        }
        Ok(FrameOutcome::Presented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Rebuild(u32, u32),
        Render,
        Present,
    }

    /// Records calls; statuses are scripted per call, defaulting to Ok.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
        render_status: VecDeque<FrameStatus>,
        present_status: VecDeque<FrameStatus>,
    }

    impl Recorder {
        fn count(&self, call: fn(&Call) -> bool) -> usize {
            self.calls.iter().filter(|&c| call(c)).count()
        }
    }

    impl FrameTarget for Recorder {
        type DrawData = ();

        fn rebuild(&mut self, extent: vk::Extent2D) -> Result<()> {
            self.calls.push(Call::Rebuild(extent.width, extent.height));
            Ok(())
        }

        fn render(&mut self, _draw_data: &()) -> Result<FrameStatus> {
            self.calls.push(Call::Render);
            Ok(self.render_status.pop_front().unwrap_or(FrameStatus::Ok))
        }

        fn present(&mut self) -> Result<FrameStatus> {
            self.calls.push(Call::Present);
            Ok(self.present_status.pop_front().unwrap_or(FrameStatus::Ok))
        }
    }

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn iterate(frames: &mut FrameLoop, target: &mut Recorder, size: vk::Extent2D) -> FrameOutcome {
        frames.prepare(target, size).unwrap();
        frames.submit(target, &()).unwrap()
    }

    #[test]
    fn steady_state_never_rebuilds() {
        let mut frames = FrameLoop::new();
        let mut target = Recorder::default();

        for _ in 0..3 {
            assert_eq!(iterate(&mut frames, &mut target, extent(800, 600)), FrameOutcome::Presented);
        }

        assert_eq!(
            target.calls,
            [Call::Render, Call::Present, Call::Render, Call::Present, Call::Render, Call::Present]
        );
    }

    #[test]
    fn resize_rebuilds_once_before_next_present() {
        let mut frames = FrameLoop::new();
        let mut target = Recorder::default();

        iterate(&mut frames, &mut target, extent(800, 600));
        target.calls.clear();

        frames.request_rebuild();
        assert_eq!(iterate(&mut frames, &mut target, extent(1024, 768)), FrameOutcome::Presented);
        iterate(&mut frames, &mut target, extent(1024, 768));

        assert_eq!(
            target.calls,
            [
                Call::Rebuild(1024, 768),
                Call::Render,
                Call::Present,
                Call::Render,
                Call::Present
            ]
        );
        assert_eq!(frames.state(), SwapchainState::Ready);
    }

    #[test]
    fn zero_sized_resize_leaves_swapchain_ready() {
        let mut frames = FrameLoop::new();

        frames.on_resize(0, 600);
        assert_eq!(frames.state(), SwapchainState::Ready);
        frames.on_resize(800, 0);
        assert_eq!(frames.state(), SwapchainState::Ready);
    }

    #[test]
    fn resize_event_rebuilds_then_renders_then_presents() {
        let mut frames = FrameLoop::new();
        let mut target = Recorder::default();

        frames.on_resize(1024, 768);
        assert_eq!(frames.state(), SwapchainState::NeedsRebuild);

        assert_eq!(iterate(&mut frames, &mut target, extent(1024, 768)), FrameOutcome::Presented);
        assert_eq!(target.calls, [Call::Rebuild(1024, 768), Call::Render, Call::Present]);
        assert_eq!(frames.state(), SwapchainState::Ready);
    }

    #[test]
    fn repeated_resize_events_still_rebuild_once() {
        let mut frames = FrameLoop::new();
        let mut target = Recorder::default();

        frames.request_rebuild();
        frames.request_rebuild();
        frames.request_rebuild();
        iterate(&mut frames, &mut target, extent(640, 480));

        assert_eq!(target.count(|c| matches!(c, Call::Rebuild(..))), 1);
        assert_eq!(target.calls[0], Call::Rebuild(640, 480));
    }

    #[test]
    fn stale_acquire_aborts_the_frame() {
        let mut frames = FrameLoop::new();
        let mut target = Recorder::default();
        target.render_status.push_back(FrameStatus::OutOfDate);

        assert_eq!(iterate(&mut frames, &mut target, extent(800, 600)), FrameOutcome::Aborted);
        assert_eq!(target.calls, [Call::Render]);
        assert_eq!(frames.state(), SwapchainState::NeedsRebuild);

        iterate(&mut frames, &mut target, extent(800, 600));
        assert_eq!(
            target.calls,
            [Call::Render, Call::Rebuild(800, 600), Call::Render, Call::Present]
        );
    }

    #[test]
    fn stale_present_defers_rebuild_to_next_iteration() {
        let mut frames = FrameLoop::new();
        let mut target = Recorder::default();
        target.present_status.push_back(FrameStatus::OutOfDate);

        iterate(&mut frames, &mut target, extent(800, 600));
        assert_eq!(frames.state(), SwapchainState::NeedsRebuild);
        assert_eq!(target.count(|c| matches!(c, Call::Rebuild(..))), 0);

        iterate(&mut frames, &mut target, extent(800, 600));
        assert_eq!(
            target.calls,
            [Call::Render, Call::Present, Call::Rebuild(800, 600), Call::Render, Call::Present]
        );
    }

    #[test]
    fn minimized_window_keeps_rebuild_pending_and_skips_present() {
        let mut frames = FrameLoop::new();
        let mut target = Recorder::default();

        frames.request_rebuild();
        assert_eq!(
            iterate(&mut frames, &mut target, extent(0, 600)),
            FrameOutcome::PresentSkipped
        );
        assert_eq!(
            iterate(&mut frames, &mut target, extent(800, 0)),
            FrameOutcome::PresentSkipped
        );
        assert_eq!(target.calls, [Call::Render, Call::Render]);
        assert_eq!(frames.state(), SwapchainState::NeedsRebuild);

        // Restored: exactly one rebuild, then presentation resumes
        iterate(&mut frames, &mut target, extent(800, 600));
        assert_eq!(target.count(|c| matches!(c, Call::Rebuild(..))), 1);
        assert_eq!(target.calls.last(), Some(&Call::Present));
    }

    #[test]
    fn no_present_call_precedes_the_rebuild() {
        let mut frames = FrameLoop::new();
        let mut target = Recorder::default();

        frames.request_rebuild();
        iterate(&mut frames, &mut target, extent(0, 0));
        iterate(&mut frames, &mut target, extent(300, 200));

        let rebuild_at = target
            .calls
            .iter()
            .position(|c| matches!(c, Call::Rebuild(..)))
            .unwrap();
        let first_present = target.calls.iter().position(|c| *c == Call::Present).unwrap();
        assert!(rebuild_at < first_present);
    }
}
