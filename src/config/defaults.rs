use super::*;

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            success_rate: 0.95,
            min_delay_ms: 1000,
            max_delay_ms: 3000,
            seed: None,
        }
    }
}

impl Default for ChargingConfig {
    fn default() -> Self {
        Self {
            battery_capacity_kwh: 82.0,
            max_charging_rate_kw: 250.0,
            slow_charging_rate_kw: 11.0,
            fast_charger_voltage: 400.0,
            slow_charger_voltage: 240.0,
            price_per_kwh: 0.35,
            tick_interval_ms: 1000,
            simulated_seconds_per_tick: 1.0,
            default_charge_limit: 80,
            history_limit: 50,
            stop_join_timeout_ms: 2000,
            location: None,
            seed: None,
        }
    }
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            scenario: "normal".to_string(),
            ignore_cache: false,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/landau.log".to_string(),
            format: "structured".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            commands: CommandsConfig::default(),
            charging: ChargingConfig::default(),
            vehicle: VehicleConfig::default(),
            persistence: PersistenceConfig::default(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
            timezone: "UTC".to_string(),
        }
    }
}
