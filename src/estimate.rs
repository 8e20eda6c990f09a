//! Impact estimates: mass, energy, crater size, seismic magnitude
//!
//! Estimates are advisory. The local model always runs on impact; a remote
//! service can be configured on top and answers on a worker thread. Neither
//! feeds back into crater carving, which uses scene-unit sizing.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::error::EstimateError;
use crate::lat_lon_deg;
use crate::sim::state::ImpactEvent;

/// 1 megaton of TNT in joules
pub const MEGATON_JOULES: f64 = 4.184e15;
/// m/s²
pub const SURFACE_GRAVITY: f64 = 9.8;
/// kg/m³, target crust
pub const TARGET_DENSITY: f64 = 3000.0;
pub const CRATER_COEFFICIENT: f64 = 1.5;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Sphere mass (kg) from diameter (m) and density (kg/m³)
pub fn estimate_mass(diameter_m: f64, density: f64) -> f64 {
    let radius = diameter_m / 2.0;
    4.0 / 3.0 * std::f64::consts::PI * radius.powi(3) * density
}

/// `E = ½ m v²` in joules
pub fn kinetic_energy(mass_kg: f64, velocity_m_s: f64) -> f64 {
    0.5 * mass_kg * velocity_m_s * velocity_m_s
}

/// Final crater diameter (m), simplified energy scaling
pub fn crater_diameter(energy_j: f64) -> f64 {
    if energy_j <= 0.0 {
        return 0.0;
    }
    CRATER_COEFFICIENT * (energy_j / (SURFACE_GRAVITY * TARGET_DENSITY)).powf(0.25)
}

/// Richter-style magnitude, rounded to two decimals
pub fn seismic_magnitude(energy_j: f64) -> f64 {
    if energy_j <= 0.0 {
        return 0.0;
    }
    round2(2.0 / 3.0 * energy_j.log10() - 3.2)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

/// Body of `POST /simulate-impact` (MKS units)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactRequest {
    /// Meters
    pub diameter: f64,
    /// m/s
    pub velocity: f64,
    /// kg/m³
    pub density: f64,
    /// Degrees between trajectory and surface plane (90 = vertical)
    pub angle: f64,
    pub location: Option<Location>,
}

impl ImpactRequest {
    pub fn from_impact(event: &ImpactEvent) -> Self {
        let (lat, lon) = lat_lon_deg(event.local_point);
        Self {
            diameter: f64::from(event.diameter_km) * 1000.0,
            velocity: f64::from(event.velocity_km_s) * 1000.0,
            density: event.density.density_kg_m3(),
            angle: f64::from(event.impact_angle_deg),
            location: Some(Location {
                lat: f64::from(lat),
                lon: f64::from(lon),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KineticEnergy {
    pub joules: f64,
    pub megatons_tnt: f64,
    pub effective_velocity_m_s: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEffects {
    pub crater_diameter_m_approx: f64,
    pub seismic_magnitude: f64,
    pub tsunami_risk: bool,
    #[serde(default)]
    pub note: Option<String>,
}

/// Response of `POST /simulate-impact`; unknown fields are ignored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactResponse {
    pub calculated_mass_kg: f64,
    pub kinetic_energy: KineticEnergy,
    pub impact_effects: ImpactEffects,
}

#[derive(Debug, Deserialize)]
struct EstimateErrorResponse {
    error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimateSource {
    Local,
    Remote,
}

/// Figures shown to the user after an impact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEstimate {
    pub source: EstimateSource,
    pub mass_kg: f64,
    pub energy_joules: f64,
    pub megatons_tnt: f64,
    pub effective_velocity_m_s: f64,
    pub crater_diameter_m: f64,
    pub seismic_magnitude: f64,
    pub tsunami_risk: bool,
}

impl ImpactEstimate {
    /// Run the local model. Only the velocity component normal to the surface counts.
    pub fn local(request: &ImpactRequest, tsunami_risk: bool) -> Self {
        let mass = estimate_mass(request.diameter, request.density);
        let effective = request.velocity * request.angle.to_radians().sin();
        let energy = kinetic_energy(mass, effective);
        Self {
            source: EstimateSource::Local,
            mass_kg: mass,
            energy_joules: energy,
            megatons_tnt: energy / MEGATON_JOULES,
            effective_velocity_m_s: effective,
            crater_diameter_m: round2(crater_diameter(energy)),
            seismic_magnitude: seismic_magnitude(energy),
            tsunami_risk,
        }
    }

    pub fn from_response(response: &ImpactResponse) -> Self {
        Self {
            source: EstimateSource::Remote,
            mass_kg: response.calculated_mass_kg,
            energy_joules: response.kinetic_energy.joules,
            megatons_tnt: response.kinetic_energy.megatons_tnt,
            effective_velocity_m_s: response.kinetic_energy.effective_velocity_m_s,
            crater_diameter_m: response.impact_effects.crater_diameter_m_approx,
            seismic_magnitude: response.impact_effects.seismic_magnitude,
            tsunami_risk: response.impact_effects.tsunami_risk,
        }
    }
}

/// Anything that can turn a request into an estimate. Runs off the frame thread.
pub trait ImpactEstimator: Send {
    fn estimate(&self, request: &ImpactRequest) -> Result<ImpactResponse, EstimateError>;
}

/// Blocking HTTP client for the estimate service
pub struct HttpEstimator {
    http: reqwest::blocking::Client,
    pub base_url: String,
}

impl HttpEstimator {
    pub fn new(base_url: impl Into<String>) -> Result<Self, EstimateError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(EstimateError::Transport)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl ImpactEstimator for HttpEstimator {
    fn estimate(&self, request: &ImpactRequest) -> Result<ImpactResponse, EstimateError> {
        let url = format!("{}/simulate-impact", self.base_url);
        let res = self
            .http
            .post(url)
            .json(request)
            .send()
            .map_err(EstimateError::Transport)?;
        let status = res.status();

        // Keep the service's message for the user notice
        if !status.is_success() {
            let message = res.json::<EstimateErrorResponse>().ok().map(|payload| payload.error);
            return Err(EstimateError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        res.json::<ImpactResponse>().map_err(EstimateError::Decode)
    }
}

/// A finished request, tagged with the cycle that asked for it
pub type EstimateResult = (u64, Result<ImpactResponse, EstimateError>);

/// Runs an [`ImpactEstimator`] on a worker thread.
///
/// [`submit`](Self::submit) never blocks; results are collected with
/// [`drain_results`](Self::drain_results) once per frame. Dropping the
/// service closes the request channel and the worker exits after its
/// current request.
pub struct EstimateService {
    requests: Sender<(u64, ImpactRequest)>,
    results: Receiver<EstimateResult>,
}

impl EstimateService {
    pub fn start(estimator: impl ImpactEstimator + 'static) -> Option<Self> {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<(u64, ImpactRequest)>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();

        let spawned = std::thread::Builder::new()
            .name("impact-estimate".to_string())
            .spawn(move || {
                while let Ok((cycle, request)) = request_rx.recv() {
                    let result = estimator.estimate(&request);
                    if let Err(e) = &result {
                        log::debug!("Estimate for cycle {cycle} failed: {e}");
                    }
                    if result_tx.send((cycle, result)).is_err() {
                        break;
                    }
                }
            });

        match spawned {
            Ok(_) => Some(Self {
                requests: request_tx,
                results: result_rx,
            }),
            Err(e) => {
                log::warn!("Could not start estimate worker: {e}");
                None
            }
        }
    }

    pub fn submit(&self, cycle: u64, request: ImpactRequest) -> Result<(), EstimateError> {
        self.requests
            .send((cycle, request))
            .map_err(|_| EstimateError::Unavailable)
    }

    /// Every result that has arrived since the last call
    pub fn drain_results(&self) -> Vec<EstimateResult> {
        self.results.try_iter().collect()
    }
}
