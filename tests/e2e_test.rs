use chrono::NaiveDate;
use smacross::api::AlpacaClient;
use smacross::backtest::{BacktestRunner, MarketScenario, SyntheticDataGenerator};
use smacross::config::{AlpacaSettings, BacktestSettings, ReportSettings, StrategyConfig};
use smacross::report::{self, ConsoleSummary, HtmlChart, ReportSink};
use smacross::TradeSide;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_synthetic_backtest_to_report() {
    let _ = tracing_subscriber::fmt::try_init();

    let config = StrategyConfig {
        symbol: "SYNTH".to_string(),
        start_date: date(2020, 1, 1),
        end_date: date(2021, 1, 1),
        ..Default::default()
    };
    let runner = BacktestRunner::new(config, BacktestSettings::default()).unwrap();
    let provider = SyntheticDataGenerator::new(7, MarketScenario::Sideways);

    let result = runner.run(&provider).await.unwrap();

    // Weekdays in 2020 from Jan 1 through Dec 31 plus Jan 1 2021
    assert_eq!(result.snapshots.len(), 263);
    assert_eq!(result.metrics.get("total_trades"), Some(result.trades.len() as f64));
    if let Some(first) = result.trades.first() {
        assert_eq!(first.side, TradeSide::Buy);
    }

    let path = std::env::temp_dir().join(format!("smacross-e2e-{}.html", uuid::Uuid::new_v4()));
    let mut summary = ConsoleSummary::new(Vec::new());
    let mut chart = HtmlChart::new(&path);
    {
        let mut sinks: Vec<&mut dyn ReportSink> = vec![&mut summary, &mut chart];
        report::publish(&result, &ReportSettings::default(), &mut sinks).unwrap();
    }

    let text = String::from_utf8(summary.into_inner()).unwrap();
    assert!(text.contains("information to SYNTH"));
    assert!(text.contains("      start_date: 2020-01-01"));
    assert!(text.contains("      Sharpe Ratio: "));

    let html = std::fs::read_to_string(&path).unwrap();
    assert!(html.contains("SMA 10"));
    assert!(html.contains("SMA 50"));
    assert!(html.contains("Account Value"));
    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_alpaca_backed_backtest() {
    let mut server = mockito::Server::new_async().await;

    let body = r#"{
        "bars": [
            {"t": "2021-01-01T05:00:00Z", "o": 10.0, "h": 10.0, "l": 10.0, "c": 10.0, "v": 100},
            {"t": "2021-01-02T05:00:00Z", "o": 10.0, "h": 10.0, "l": 10.0, "c": 10.0, "v": 100},
            {"t": "2021-01-03T05:00:00Z", "o": 10.0, "h": 10.0, "l": 10.0, "c": 10.0, "v": 100},
            {"t": "2021-01-04T05:00:00Z", "o": 1.0, "h": 1.0, "l": 1.0, "c": 1.0, "v": 100},
            {"t": "2021-01-05T05:00:00Z", "o": 100.0, "h": 100.0, "l": 100.0, "c": 100.0, "v": 100},
            {"t": "2021-01-06T05:00:00Z", "o": 100.0, "h": 100.0, "l": 100.0, "c": 100.0, "v": 100}
        ],
        "symbol": "TEST",
        "next_page_token": null
    }"#;

    let mock = server
        .mock("GET", "/v2/stocks/TEST/bars")
        .match_query(mockito::Matcher::UrlEncoded(
            "start".into(),
            "2020-12-19".into(),
        ))
        .match_header("APCA-API-KEY-ID", "key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let alpaca = AlpacaSettings {
        api_key: Some("key".to_string()),
        secret_key: Some("secret".to_string()),
        data_url: server.url(),
        ..Default::default()
    };
    let client = AlpacaClient::new(&alpaca).unwrap();

    let config = StrategyConfig {
        short_period: 2,
        long_period: 3,
        symbol: "TEST".to_string(),
        start_date: date(2021, 1, 4),
        end_date: date(2021, 1, 6),
    };
    let settings = BacktestSettings {
        initial_cash: 1000.0,
        ..Default::default()
    };
    let runner = BacktestRunner::new(config, settings).unwrap();
    assert_eq!(runner.warmup_start().unwrap(), date(2020, 12, 19));

    let result = runner.run(&client).await.unwrap();

    mock.assert_async().await;
    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.trades[0].side, TradeSide::Buy);
    assert_eq!(result.trades[1].side, TradeSide::Sell);
    assert_eq!(result.final_account_value(), 100_000.0);
    assert!((result.metrics.get("cum_returns").unwrap() - 9900.0).abs() < 1e-9);
}
