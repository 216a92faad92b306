//! Reference ranges and direction of every known indicator

/// `[min, max]` reference range used to rescale raw values onto 0–100
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Benchmark {
    pub min: f64,
    pub max: f64,
}

impl Benchmark {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Values outside this band are treated as data errors rather than outliers
    pub fn plausible_band(&self) -> (f64, f64) {
        let spread = 2.0 * self.range();
        (self.min - spread, self.max + spread)
    }
}

/// Used when an indicator has no entry in the table
pub const DEFAULT_BENCHMARK: Benchmark = Benchmark::new(0.0, 100.0);

pub fn benchmark_for(indicator: &str) -> Option<Benchmark> {
    let benchmark = match indicator {
        "pm25_concentration" => Benchmark::new(0.0, 75.0),
        "pm10_concentration" => Benchmark::new(0.0, 150.0),
        "co2_emissions" => Benchmark::new(0.0, 20.0),
        "green_area_per_capita" => Benchmark::new(0.0, 50.0),
        "life_expectancy" => Benchmark::new(49.0, 83.5),
        "maternal_mortality" => Benchmark::new(3.0, 1100.0),
        "under_five_mortality" => Benchmark::new(2.0, 180.0),
        "literacy_rate" => Benchmark::new(0.0, 100.0),
        "mean_years_schooling" => Benchmark::new(0.0, 15.0),
        "unemployment_rate" => Benchmark::new(1.0, 28.0),
        "homicide_rate" => Benchmark::new(0.0, 50.0),
        "internet_access" => Benchmark::new(0.0, 100.0),
        "gdp_per_capita" => Benchmark::new(500.0, 100_000.0),
        _ => return None,
    };
    Some(benchmark)
}

/// Indicators where a lower raw value is the better outcome
pub fn is_inverse(indicator: &str) -> bool {
    matches!(
        indicator,
        "pm25_concentration"
            | "pm10_concentration"
            | "co2_emissions"
            | "maternal_mortality"
            | "under_five_mortality"
            | "unemployment_rate"
            | "homicide_rate"
    )
}

/// Indicators for which a negative value can only be a data error
pub fn must_be_non_negative(indicator: &str) -> bool {
    benchmark_for(indicator).is_some()
        || matches!(
            indicator,
            "population" | "population_density" | "urban_area_km2" | "number_of_monitoring_stations"
        )
}

/// Plausible range the simulated provider draws readings from
pub fn simulated_range(indicator: &str) -> (f64, f64) {
    match indicator {
        "pm25_concentration" => (5.0, 80.0),
        "pm10_concentration" => (10.0, 150.0),
        "co2_emissions" => (1.0, 20.0),
        "green_area_per_capita" => (1.0, 50.0),
        "life_expectancy" => (55.0, 85.0),
        "maternal_mortality" => (5.0, 500.0),
        "under_five_mortality" => (2.0, 100.0),
        "literacy_rate" => (60.0, 100.0),
        "mean_years_schooling" => (4.0, 14.0),
        "unemployment_rate" => (2.0, 25.0),
        "homicide_rate" => (0.5, 40.0),
        "internet_access" => (20.0, 100.0),
        "gdp_per_capita" => (1000.0, 80_000.0),
        "population" => (50_000.0, 20_000_000.0),
        _ => (0.0, 100.0),
    }
}
