pub mod currency;
pub mod ensemble;
pub mod estimators;

pub use currency::CurrencyConverter;
pub use ensemble::{EnsembleConfig, EnsembleEstimate, PricingEnsemble, Vote};
pub use estimators::{FrontierEstimator, NeighborAverageEstimator, SpecialistEstimator};
