//! Focused unit tests covering CLI parsing and configuration resolution.

use std::time::Duration;

use camino::Utf8PathBuf;
use clap::CommandFactory;
use placefinder_data::{GatewayBuildError, RetryPolicy};
use rstest::rstest;

use super::*;
use crate::search::{SearchArgs, SearchConfig, config_from_layers_for_test};
use crate::serve::{DEFAULT_LISTEN, ServeArgs, ServeConfig};
use crate::settings::{DEFAULT_STATE_DIR, GatewayOverrides, GatewaySettings};

#[rstest]
fn command_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[rstest]
fn parses_search_flags_with_negative_coordinates() {
    let cli = Cli::try_parse_from([
        "placefinder",
        "-vv",
        "search",
        "--search",
        "Christ the Redeemer",
        "--bbox",
        "-23.0,-43.3,-22.9,-43.1",
        "--limit",
        "5",
    ])
    .expect("arguments should parse");

    assert_eq!(cli.verbose, 2);
    match cli.command {
        Command::Search(args) => {
            assert_eq!(args.search.as_deref(), Some("Christ the Redeemer"));
            assert_eq!(args.bbox.as_deref(), Some("-23.0,-43.3,-22.9,-43.1"));
            assert_eq!(args.limit.as_deref(), Some("5"));
        }
        other => panic!("expected search command, found {other:?}"),
    }
}

#[rstest]
#[case(0, LevelFilter::WARN)]
#[case(1, LevelFilter::INFO)]
#[case(2, LevelFilter::DEBUG)]
#[case(7, LevelFilter::TRACE)]
fn verbosity_maps_to_levels(#[case] verbose: u8, #[case] expected: LevelFilter) {
    assert_eq!(verbosity_level(verbose), expected);
}

#[rstest]
fn converting_search_without_term_errors() {
    let err = SearchConfig::try_from(SearchArgs::default()).expect_err("missing term should error");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_SEARCH);
            assert_eq!(env, ENV_SEARCH);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn search_config_passes_raw_parameters_through() {
    let args = SearchArgs {
        search: Some("  Louvre ".to_owned()),
        bbox: Some("48.8,2.3,48.9,2.4".to_owned()),
        limit: Some("lots".to_owned()),
        ..SearchArgs::default()
    };

    let config = SearchConfig::try_from(args).expect("config should build");

    assert_eq!(config.params.search.as_deref(), Some("  Louvre "));
    assert_eq!(config.params.bbox.as_deref(), Some("48.8,2.3,48.9,2.4"));
    assert_eq!(config.params.limit.as_deref(), Some("lots"));
}

#[rstest]
fn settings_default_to_the_state_directory() {
    let settings = GatewaySettings::from(GatewayOverrides::default());
    let state = Utf8PathBuf::from(DEFAULT_STATE_DIR);

    assert_eq!(settings.cache_dir, state.join("cache"));
    assert_eq!(settings.stats_db, state.join("stats.sqlite"));
    assert_eq!(settings.mirrors, None);
    assert_eq!(settings.journal, None);

    let config = settings.gateway_config();
    assert_eq!(config.mirrors.len(), 3);
    assert_eq!(config.retry, RetryPolicy::default());
    assert_eq!(config.cache_dir(), Some(state.join("cache").as_path()));
}

#[rstest]
fn explicit_paths_override_the_state_directory() {
    let settings = GatewaySettings::from(GatewayOverrides {
        state_dir: Some(Utf8PathBuf::from("/var/lib/placefinder")),
        stats_db: Some(Utf8PathBuf::from("/srv/stats.db")),
        journal: Some(Utf8PathBuf::from("/var/log/placefinder.log")),
        ..GatewayOverrides::default()
    });

    assert_eq!(
        settings.cache_dir,
        Utf8PathBuf::from("/var/lib/placefinder/cache")
    );
    assert_eq!(settings.stats_db, Utf8PathBuf::from("/srv/stats.db"));
    let config = settings.gateway_config();
    assert_eq!(
        config.journal_path,
        Some(Utf8PathBuf::from("/var/log/placefinder.log"))
    );
}

#[rstest]
#[case::list(
    "https://a.test/api, ,https://b.test/api ",
    &["https://a.test/api", "https://b.test/api"]
)]
#[case::single("https://a.test/api", &["https://a.test/api"])]
fn mirror_lists_are_split_on_commas(#[case] raw: &str, #[case] expected: &[&str]) {
    let settings = GatewaySettings::from(GatewayOverrides {
        mirrors: Some(raw.to_owned()),
        ..GatewayOverrides::default()
    });

    let config = settings.gateway_config();
    assert_eq!(config.mirrors, expected);
}

#[rstest]
fn blank_mirror_list_fails_validation() {
    let settings = GatewaySettings::from(GatewayOverrides {
        mirrors: Some(" , ".to_owned()),
        ..GatewayOverrides::default()
    });

    let err = settings
        .gateway_config()
        .validate()
        .expect_err("no mirrors should be rejected");
    assert!(matches!(err, GatewayBuildError::NoMirrors));
}

#[rstest]
#[case::default(None, RetryPolicy::default().deadline)]
#[case::custom(Some(5), Some(Duration::from_secs(5)))]
#[case::disabled(Some(0), None)]
fn deadline_seconds_map_onto_the_retry_policy(
    #[case] secs: Option<u64>,
    #[case] expected: Option<Duration>,
) {
    let settings = GatewaySettings::from(GatewayOverrides {
        deadline_secs: secs,
        ..GatewayOverrides::default()
    });

    assert_eq!(settings.gateway_config().retry.deadline, expected);
}

#[rstest]
fn serve_listens_on_loopback_by_default() {
    let config = ServeConfig::try_from(ServeArgs::default()).expect("config should build");
    assert_eq!(config.listen.to_string(), DEFAULT_LISTEN);
}

#[rstest]
fn serve_rejects_unparseable_listen_address() {
    let args = ServeArgs {
        listen: Some("localhost".to_owned()),
        ..ServeArgs::default()
    };

    let err = ServeConfig::try_from(args).expect_err("bare host should be rejected");
    match err {
        CliError::InvalidListenAddress { value, .. } => assert_eq!(value, "localhost"),
        other => panic!("expected InvalidListenAddress, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_maps_configuration_errors() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "deadline_secs": "soon" }));

    let err = config_from_layers_for_test(composer.layers())
        .expect_err("invalid config layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_honours_precedence() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({
            "search": "Louvre",
            "mirrors": "https://file.test/api/interpreter",
            "deadline_secs": 10,
        }),
        None,
    );
    composer.push_environment(json!({
        "state_dir": "/srv/from-env",
        "deadline_secs": 20,
    }));
    composer.push_cli(json!({
        "search": "Eiffel Tower",
    }));

    let config =
        config_from_layers_for_test(composer.layers()).expect("merged config should build");
    assert_eq!(config.params.search.as_deref(), Some("Eiffel Tower"));
    assert_eq!(
        config.gateway.mirrors,
        Some(vec!["https://file.test/api/interpreter".to_owned()])
    );
    assert_eq!(
        config.gateway.cache_dir,
        Utf8PathBuf::from("/srv/from-env/cache")
    );
    assert_eq!(config.gateway.deadline, Some(Duration::from_secs(20)));
}
