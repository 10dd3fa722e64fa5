use std::fmt;
use std::str::FromStr;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Gamma, LogNormal, Normal, Weibull};

use crate::api::config_dto::DistributionDto;
use crate::domain::simulator::event::SimTime;
use crate::error::ConfigurationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionFamily {
    Weibull,
    LogNormal,
    Gamma,
    Normal,
}

impl FromStr for DistributionFamily {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "weibull" => Ok(DistributionFamily::Weibull),
            "lognormal" | "log_normal" => Ok(DistributionFamily::LogNormal),
            "gamma" => Ok(DistributionFamily::Gamma),
            "normal" => Ok(DistributionFamily::Normal),
            _ => Err(ConfigurationError::UnknownPolicy { kind: "distribution family", name: s.to_string() }),
        }
    }
}

impl fmt::Display for DistributionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistributionFamily::Weibull => "weibull",
            DistributionFamily::LogNormal => "lognormal",
            DistributionFamily::Gamma => "gamma",
            DistributionFamily::Normal => "normal",
        };
        write!(f, "{}", name)
    }
}

/// Family plus parameters of the time between failures.
///
/// `scale` and `shape` map onto each family as: Weibull(scale, shape), LogNormal(mu = scale, sigma = shape),
/// Gamma(shape, scale), Normal(mean = scale, std_dev = shape).
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionParams {
    pub family: DistributionFamily,
    pub scale: f64,
    pub shape: f64,
    /// Samples drawn up front and added per extension.
    pub sample_size: usize,
    pub max_extensions: u32,
    pub seed: u64,
}

impl DistributionParams {
    pub fn new(family: DistributionFamily, scale: f64, shape: f64) -> Self {
        DistributionParams { family, scale, shape, sample_size: 50, max_extensions: 50, seed: 0 }
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_max_extensions(mut self, max_extensions: u32) -> Self {
        self.max_extensions = max_extensions;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl TryFrom<&DistributionDto> for DistributionParams {
    type Error = ConfigurationError;

    fn try_from(dto: &DistributionDto) -> Result<Self, Self::Error> {
        let params = DistributionParams {
            family: dto.family.parse()?,
            scale: dto.scale,
            shape: dto.shape,
            sample_size: dto.sample_size,
            max_extensions: dto.max_extensions,
            seed: dto.seed,
        };
        Sampler::new(&params)?;
        Ok(params)
    }
}

#[derive(Debug, Clone)]
enum Sampler {
    Weibull(Weibull<f64>),
    LogNormal(LogNormal<f64>),
    Gamma(Gamma<f64>),
    Normal(Normal<f64>),
}

impl Sampler {
    fn new(params: &DistributionParams) -> Result<Self, ConfigurationError> {
        let invalid = |e: String| ConfigurationError::InvalidDistribution(format!("{} (scale {}, shape {}): {}", params.family, params.scale, params.shape, e));

        if params.sample_size == 0 {
            return Err(ConfigurationError::InvalidDistribution("sample size must be at least 1".to_string()));
        }

        let sampler = match params.family {
            DistributionFamily::Weibull => Sampler::Weibull(Weibull::new(params.scale, params.shape).map_err(|e| invalid(e.to_string()))?),
            DistributionFamily::LogNormal => Sampler::LogNormal(LogNormal::new(params.scale, params.shape).map_err(|e| invalid(e.to_string()))?),
            DistributionFamily::Gamma => Sampler::Gamma(Gamma::new(params.shape, params.scale).map_err(|e| invalid(e.to_string()))?),
            DistributionFamily::Normal => Sampler::Normal(Normal::new(params.scale, params.shape).map_err(|e| invalid(e.to_string()))?),
        };
        Ok(sampler)
    }

    fn sample(&self, rng: &mut StdRng) -> f64 {
        match self {
            Sampler::Weibull(d) => d.sample(rng),
            Sampler::LogNormal(d) => d.sample(rng),
            Sampler::Gamma(d) => d.sample(rng),
            Sampler::Normal(d) => d.sample(rng),
        }
    }
}

/// Monotonically increasing failure instants: the running sum of sampled inter-failure times.
///
/// Instants are consumed in order through a cursor. When every remaining instant lies before a window, the sequence
/// is extended by another `sample_size` draws, at most `max_extensions` times.
#[derive(Debug, Clone)]
pub struct DistributionGenerator {
    params: DistributionParams,
    sampler: Sampler,
    rng: StdRng,
    cumulative: Vec<SimTime>,
    cursor: usize,
    extensions: u32,
}

impl DistributionGenerator {
    pub fn new(params: DistributionParams) -> Result<Self, ConfigurationError> {
        let sampler = Sampler::new(&params)?;
        let rng = StdRng::seed_from_u64(params.seed);
        let mut generator = DistributionGenerator { sampler, rng, cumulative: Vec::with_capacity(params.sample_size), cursor: 0, extensions: 0, params };
        generator.draw(generator.params.sample_size);
        Ok(generator)
    }

    fn draw(&mut self, count: usize) {
        let mut total = self.cumulative.last().copied().unwrap_or(0.0);
        for _ in 0..count {
            // Normal can go negative; time between failures cannot.
            total += self.sampler.sample(&mut self.rng).max(0.0);
            self.cumulative.push(total);
        }
    }

    /// Appends another batch of instants. `false` once the extension budget is spent.
    pub fn extend(&mut self) -> bool {
        if self.extensions >= self.params.max_extensions {
            return false;
        }
        self.extensions += 1;
        self.draw(self.params.sample_size);
        log::debug!("Failure samples extended to {} ({} of {} extensions).", self.cumulative.len(), self.extensions, self.params.max_extensions);
        true
    }

    pub fn cumulative_samples(&self) -> &[SimTime] {
        &self.cumulative
    }

    pub fn consumed(&self) -> usize {
        self.cursor
    }

    pub fn params(&self) -> &DistributionParams {
        &self.params
    }

    /// Consumes and returns the first unconsumed instant inside `[start, end]`, if any.
    pub fn consume_in_window(&mut self, start: SimTime, end: SimTime) -> Option<SimTime> {
        loop {
            match self.cumulative[self.cursor..].iter().position(|&instant| instant >= start) {
                Some(offset) => {
                    let idx = self.cursor + offset;
                    let instant = self.cumulative[idx];
                    if instant > end {
                        return None;
                    }
                    self.cursor = idx + 1;
                    return Some(instant);
                }
                None => {
                    if !self.extend() {
                        return None;
                    }
                }
            }
        }
    }
}
