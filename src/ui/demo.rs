// The one hard-coded window of the demo

pub struct DemoWindow {
    pub value: f32,
    pub counter: u32,
    /// Straight (not premultiplied) RGBA
    pub clear_color: [f32; 4],
}

impl DemoWindow {
    pub fn new(clear_color: [f32; 4]) -> Self {
        Self {
            value: 0.0,
            counter: 0,
            clear_color,
        }
    }

    pub fn draw(&mut self, ui: &imgui::Ui) {
        ui.window("Hello, world!").build(|| {
            ui.text("This is some useful text.");
            ui.slider("float", 0.0, 1.0, &mut self.value);

            let mut rgb = [self.clear_color[0], self.clear_color[1], self.clear_color[2]];
            if ui.color_edit3("clear color", &mut rgb) {
                self.clear_color[..3].copy_from_slice(&rgb);
            }

            if ui.button("Button") {
                self.counter += 1;
            }
            ui.same_line();
            ui.text(format!("counter = {}", self.counter));

            let framerate = ui.io().framerate;
            ui.text(format!(
                "Application average {:.3} ms/frame ({:.1} FPS)",
                1000.0 / framerate,
                framerate
            ));
        });
    }

    /// Clear value for the render pass: RGB scaled by alpha
    pub fn premultiplied_clear_color(&self) -> [f32; 4] {
        let [r, g, b, a] = self.clear_color;
        [r * a, g * a, b * a, a]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_color_is_unchanged() {
        let demo = DemoWindow::new([0.45, 0.55, 0.60, 1.0]);
        assert_eq!(demo.premultiplied_clear_color(), [0.45, 0.55, 0.60, 1.0]);
    }

    #[test]
    fn translucent_color_is_scaled() {
        let demo = DemoWindow::new([1.0, 0.5, 0.25, 0.5]);
        assert_eq!(demo.premultiplied_clear_color(), [0.5, 0.25, 0.125, 0.5]);
    }

    #[test]
    fn starts_at_zero() {
        let demo = DemoWindow::new([0.0; 4]);
        assert_eq!(demo.counter, 0);
        assert_eq!(demo.value, 0.0);
    }
}
