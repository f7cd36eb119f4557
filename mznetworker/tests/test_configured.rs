use std::fs;

use figment::{
    providers::{Format, Toml},
    Figment,
};

#[test_log::test]
#[test_log(default_log_filter = "debug")]
fn test_small_network() {
    let mut config = Figment::new();
    config = config.merge(Toml::file_exact("./tests/data/small_network.toml"));
    let driver: mznetworker::MZNetworker = config.extract().unwrap();
    assert_eq!(driver.top_n, 5);
    assert!(driver.log_file.is_none());
    driver.main().unwrap();

    let table = fs::read_to_string(&driver.component_output_file).unwrap();
    let mut lines = table.lines();
    assert_eq!(
        lines.next(),
        Some("feature_id\tcomponent_id\tprecursor_mz")
    );
    assert_eq!(lines.count(), 6);
    assert!(driver.graph_output_file.exists());
}

#[test_log::test]
fn test_out_of_range_configuration() {
    let config = Figment::new()
        .merge(Toml::file_exact("./tests/data/small_network.toml"))
        .merge(Toml::string("score_cutoff = 5.0\nmsms_mz_tol = -1.0"));
    let driver: mznetworker::MZNetworker = config.extract().unwrap();
    assert_eq!(driver.score_cutoff, 5.0);
    assert!(matches!(
        driver.validate(),
        Err(mznetworker::MZNetworkerError::InvalidParameter(_))
    ));
    assert!(matches!(
        driver.main(),
        Err(mznetworker::MZNetworkerError::InvalidParameter(_))
    ));
}
