use image::RgbImage;
use serde::Serialize;
use std::time::Instant;

use super::steps;

/// Filter strengths, always clamped to their ranges and rounded to one decimal
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FilterParams {
    denoise: f32,
    sharpen: f32,
}

impl FilterParams {
    pub const DENOISE_MIN: f32 = 0.0;
    pub const DENOISE_MAX: f32 = 50.0;
    pub const SHARPEN_MIN: f32 = -3.0;
    pub const SHARPEN_MAX: f32 = 3.0;

    pub fn denoise(&self) -> f32 {
        self.denoise
    }

    pub fn sharpen(&self) -> f32 {
        self.sharpen
    }

    pub fn set_denoise(&mut self, value: f32) {
        self.denoise = normalize(value, Self::DENOISE_MIN, Self::DENOISE_MAX);
    }

    pub fn set_sharpen(&mut self, value: f32) {
        self.sharpen = normalize(value, Self::SHARPEN_MIN, Self::SHARPEN_MAX);
    }

    pub fn denoise_label(&self) -> String {
        format!("{:.1}", self.denoise)
    }

    pub fn sharpen_label(&self) -> String {
        format!("{:.1}", self.sharpen)
    }

    /// True when both steps would be skipped
    pub fn is_identity(&self) -> bool {
        self.denoise == 0.0 && self.sharpen == 0.0
    }
}

/// Clamp to range and round to one decimal; NaN counts as zero
fn normalize(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        return 0.0_f32.clamp(min, max);
    }
    // Adding 0.0 turns a rounded -0.0 into 0.0 so labels never read "-0.0"
    (value.clamp(min, max) * 10.0).round() / 10.0 + 0.0
}

/// Timing information for a single filter step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Result of a pipeline run including timing stats
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub image: RgbImage,
    pub total_time_ms: u64,
    pub steps: Vec<StepTiming>,
}

/// Denoise-then-sharpen pipeline for one set of strengths
pub struct Pipeline {
    params: FilterParams,
}

impl Pipeline {
    pub fn new(params: FilterParams) -> Self {
        Self { params }
    }

    /// Run the filters on `original`; the input is never modified
    pub fn process(&self, original: &RgbImage) -> PipelineResult {
        if self.params.is_identity() {
            return PipelineResult {
                image: original.clone(),
                total_time_ms: 0,
                steps: vec![],
            };
        }

        let start = Instant::now();
        let mut steps_timing = Vec::new();
        let mut current: Option<RgbImage> = None;

        // Denoise first: sharpening noisy pixels would amplify the noise
        let denoise = self.params.denoise();
        if denoise > 0.0 {
            current = Some(self.run_step("denoise", original, &mut steps_timing, |img| {
                steps::denoise::apply(img, denoise)
            }));
        }

        let sharpen = self.params.sharpen();
        if sharpen != 0.0 {
            let input = current.as_ref().unwrap_or(original);
            current = Some(self.run_step("sharpen", input, &mut steps_timing, |img| {
                steps::sharpen::apply(img, sharpen)
            }));
        }

        PipelineResult {
            image: current.unwrap_or_else(|| original.clone()),
            total_time_ms: start.elapsed().as_millis() as u64,
            steps: steps_timing,
        }
    }

    fn run_step<F>(
        &self,
        name: &str,
        img: &RgbImage,
        timings: &mut Vec<StepTiming>,
        step_fn: F,
    ) -> RgbImage
    where
        F: FnOnce(&RgbImage) -> RgbImage,
    {
        let step_start = Instant::now();
        let result = step_fn(img);
        timings.push(StepTiming {
            name: name.to_string(),
            time_ms: step_start.elapsed().as_millis() as u64,
        });
        result
    }
}
