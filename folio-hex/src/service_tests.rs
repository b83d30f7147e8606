//! ConversionService unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tokio_util::sync::CancellationToken;

    use folio_types::{
        ConversionError, ConvertRequest, Currency, CurrencyRepository, DailyRate, ExchangeRate,
        ExchangeRateId, ExchangeRatePrice, RateSource, RefreshError, RepoError,
    };

    use crate::{ConversionService, CycleOutcome, RefreshJob, RefreshSchedule};

    // ─────────────────────────────────────────────────────────────────────────────
    // Test doubles
    // ─────────────────────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct RepoState {
        currencies: Vec<String>,
        rates: Vec<ExchangeRate>,
        prices: BTreeMap<(ExchangeRateId, NaiveDate), Decimal>,
        next_id: i64,
        fail_reads: bool,
        fail_lookups: Option<fn() -> RepoError>,
        single_lookups: usize,
        batch_sizes: Vec<usize>,
    }

    /// Holds one `list_exchange_rates` call after it has read its data.
    pub struct ReadGate {
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    /// Simple in-memory repository for testing the service layer.
    pub struct MockRepo {
        state: Mutex<RepoState>,
        read_gate: Mutex<Option<Arc<ReadGate>>>,
    }

    impl MockRepo {
        pub fn new() -> Self {
            Self {
                state: Mutex::new(RepoState::default()),
                read_gate: Mutex::new(None),
            }
        }

        /// Makes the next `list_exchange_rates` call return data read before
        /// the gate is released.
        fn hold_next_rate_read(&self) -> Arc<ReadGate> {
            let gate = Arc::new(ReadGate {
                entered: tokio::sync::Notify::new(),
                release: tokio::sync::Notify::new(),
            });
            *self.read_gate.lock().unwrap() = Some(Arc::clone(&gate));
            gate
        }

        /// Repo holding `currencies` and one exchange rate per pair.
        pub fn with_rates(currencies: &[&str], pairs: &[(&str, &str)]) -> Self {
            let repo = Self::new();
            for code in currencies {
                repo.add_currency(code);
            }
            for (base, quote) in pairs {
                repo.add_rate(base, quote);
            }
            repo
        }

        fn add_currency(&self, code: &str) {
            self.state.lock().unwrap().currencies.push(code.to_string());
        }

        fn add_rate(&self, base: &str, quote: &str) -> ExchangeRateId {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = ExchangeRateId::new(state.next_id);
            state.rates.push(ExchangeRate {
                id,
                base_currency_code: base.to_string(),
                quote_currency_code: quote.to_string(),
            });
            id
        }

        fn remove_rate(&self, base: &str, quote: &str) {
            self.state
                .lock()
                .unwrap()
                .rates
                .retain(|r| r.pair() != (base, quote));
        }

        fn rate_id(&self, base: &str, quote: &str) -> ExchangeRateId {
            self.state
                .lock()
                .unwrap()
                .rates
                .iter()
                .find(|r| r.pair() == (base, quote))
                .map(|r| r.id)
                .unwrap()
        }

        fn add_price(&self, base: &str, quote: &str, on: NaiveDate, value: Decimal) {
            let id = self.rate_id(base, quote);
            self.state.lock().unwrap().prices.insert((id, on), value);
        }

        fn set_fail_reads(&self, fail: bool) {
            self.state.lock().unwrap().fail_reads = fail;
        }

        fn set_fail_lookups(&self, err: fn() -> RepoError) {
            self.state.lock().unwrap().fail_lookups = Some(err);
        }

        fn price_count(&self) -> usize {
            self.state.lock().unwrap().prices.len()
        }

        fn lookups(&self) -> (usize, Vec<usize>) {
            let state = self.state.lock().unwrap();
            (state.single_lookups, state.batch_sizes.clone())
        }

        fn find(state: &RepoState, id: ExchangeRateId, on: NaiveDate) -> Option<ExchangeRatePrice> {
            state
                .prices
                .range((id, NaiveDate::MIN)..=(id, on))
                .next_back()
                .map(|(&(id, date), &value)| ExchangeRatePrice {
                    exchange_rate_id: id,
                    date,
                    value,
                })
        }
    }

    #[async_trait]
    impl CurrencyRepository for MockRepo {
        async fn list_currencies(&self) -> Result<Vec<Currency>, RepoError> {
            let state = self.state.lock().unwrap();
            if state.fail_reads {
                return Err(RepoError::Database("connection refused".into()));
            }
            Ok(state.currencies.iter().map(Currency::from_code).collect())
        }

        async fn create_currency(&self, code: &str) -> Result<Currency, RepoError> {
            let currency = Currency::new(code)?;
            let mut state = self.state.lock().unwrap();
            if state.currencies.contains(&currency.code) {
                return Err(RepoError::Conflict(format!("Currency {}", currency)));
            }
            state.currencies.push(currency.code.clone());
            Ok(currency)
        }

        async fn list_exchange_rates(&self) -> Result<Vec<ExchangeRate>, RepoError> {
            let rates = {
                let state = self.state.lock().unwrap();
                if state.fail_reads {
                    return Err(RepoError::Database("connection refused".into()));
                }
                state.rates.clone()
            };
            let gate = self.read_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
            Ok(rates)
        }

        async fn get_exchange_rate(
            &self,
            id: ExchangeRateId,
        ) -> Result<Option<ExchangeRate>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(state.rates.iter().find(|r| r.id == id).cloned())
        }

        async fn create_exchange_rate(
            &self,
            base: &str,
            quote: &str,
        ) -> Result<ExchangeRate, RepoError> {
            let id = self.add_rate(base, quote);
            Ok(ExchangeRate {
                id,
                base_currency_code: base.to_string(),
                quote_currency_code: quote.to_string(),
            })
        }

        async fn latest_price_date(
            &self,
            id: ExchangeRateId,
        ) -> Result<Option<NaiveDate>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .prices
                .keys()
                .filter(|(rate, _)| *rate == id)
                .map(|&(_, date)| date)
                .max())
        }

        async fn price_at_or_before(
            &self,
            id: ExchangeRateId,
            on: NaiveDate,
        ) -> Result<Option<ExchangeRatePrice>, RepoError> {
            let mut state = self.state.lock().unwrap();
            state.single_lookups += 1;
            Ok(Self::find(&state, id, on))
        }

        async fn prices_at_or_before(
            &self,
            lookups: &[(ExchangeRateId, NaiveDate)],
        ) -> Result<Vec<Option<ExchangeRatePrice>>, RepoError> {
            let mut state = self.state.lock().unwrap();
            state.batch_sizes.push(lookups.len());
            if let Some(err) = state.fail_lookups {
                return Err(err());
            }
            Ok(lookups
                .iter()
                .map(|&(id, on)| Self::find(&state, id, on))
                .collect())
        }

        async fn list_prices(
            &self,
            id: ExchangeRateId,
            from: Option<NaiveDate>,
            to: Option<NaiveDate>,
        ) -> Result<Vec<ExchangeRatePrice>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .prices
                .iter()
                .filter(|((rate, date), _)| {
                    *rate == id
                        && from.is_none_or(|f| *date >= f)
                        && to.is_none_or(|t| *date <= t)
                })
                .map(|(&(id, date), &value)| ExchangeRatePrice {
                    exchange_rate_id: id,
                    date,
                    value,
                })
                .collect())
        }

        async fn insert_prices(&self, prices: &[ExchangeRatePrice]) -> Result<u64, RepoError> {
            let mut state = self.state.lock().unwrap();
            let mut inserted = 0;
            for p in prices {
                if let std::collections::btree_map::Entry::Vacant(slot) =
                    state.prices.entry((p.exchange_rate_id, p.date))
                {
                    slot.insert(p.value);
                    inserted += 1;
                }
            }
            Ok(inserted)
        }
    }

    /// Rate source serving fixed series per pair.
    pub struct MockRateSource {
        series: Mutex<HashMap<(String, String), Vec<DailyRate>>>,
        failing: Mutex<Vec<(String, String)>>,
        calls: Mutex<Vec<(String, String)>>,
        panic_next: AtomicBool,
    }

    impl MockRateSource {
        pub fn new() -> Self {
            Self {
                series: Mutex::new(HashMap::new()),
                failing: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
                panic_next: AtomicBool::new(false),
            }
        }

        fn set_series(&self, base: &str, quote: &str, points: &[(NaiveDate, Decimal)]) {
            let points = points
                .iter()
                .map(|&(date, value)| DailyRate { date, value })
                .collect();
            self.series
                .lock()
                .unwrap()
                .insert((base.to_string(), quote.to_string()), points);
        }

        fn fail(&self, base: &str, quote: &str) {
            self.failing
                .lock()
                .unwrap()
                .push((base.to_string(), quote.to_string()));
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RateSource for MockRateSource {
        async fn fetch_daily_series(
            &self,
            base: &str,
            quote: &str,
        ) -> Result<Vec<DailyRate>, RefreshError> {
            if self.panic_next.swap(false, Ordering::SeqCst) {
                panic!("rate source exploded");
            }
            let key = (base.to_string(), quote.to_string());
            self.calls.lock().unwrap().push(key.clone());
            if self.failing.lock().unwrap().contains(&key) {
                return Err(RefreshError::Fetch("connection reset".into()));
            }
            Ok(self
                .series
                .lock()
                .unwrap()
                .get(&key)
                .cloned()
                .unwrap_or_default())
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────────

    type TestService = ConversionService<MockRepo, MockRateSource>;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// EUR -> USD -> AED with prices from 1999-01-04.
    async fn triangle_service() -> TestService {
        let repo = MockRepo::with_rates(
            &["EUR", "USD", "AED", "CHF"],
            &[("EUR", "USD"), ("USD", "AED")],
        );
        repo.add_price("EUR", "USD", date(1999, 1, 4), dec!(1.1790));
        repo.add_price("EUR", "USD", date(1999, 1, 8), dec!(1.1659));
        repo.add_price("USD", "AED", date(1999, 1, 4), dec!(3.6725));

        let service = ConversionService::new(repo, MockRateSource::new());
        service.rebuild_routing_table().await.unwrap();
        service
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Readiness & routing
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_not_ready_before_first_rebuild() {
        let repo = MockRepo::with_rates(&["EUR", "USD"], &[("EUR", "USD")]);
        let service = ConversionService::new(repo, MockRateSource::new());

        assert!(!service.is_ready());
        let err = service
            .convert_amount(dec!(1), "EUR", "USD", date(1999, 1, 4))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::NotReady));
        assert!(matches!(
            service.conversion_route("EUR", "USD"),
            Err(ConversionError::NotReady)
        ));

        service.rebuild_routing_table().await.unwrap();
        assert!(service.is_ready());
    }

    #[tokio::test]
    async fn test_route_through_intermediate() {
        let service = triangle_service().await;

        assert_eq!(
            service.conversion_route("EUR", "AED").unwrap(),
            vec!["EUR", "USD", "AED"]
        );
        assert_eq!(
            service.conversion_route("aed", "eur").unwrap(),
            vec!["AED", "USD", "EUR"]
        );
    }

    #[tokio::test]
    async fn test_unknown_and_unreachable_currencies() {
        let service = triangle_service().await;

        assert!(matches!(
            service.conversion_route("EUR", "XXX"),
            Err(ConversionError::UnknownCurrency(ref c)) if c == "XXX"
        ));
        assert!(matches!(
            service.conversion_route("EUR", "CHF"),
            Err(ConversionError::NoRouteFound { .. })
        ));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Conversion
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_identity_conversion_is_exact() {
        let service = triangle_service().await;

        let amount = dec!(123.456789012345);
        let converted = service
            .convert_amount(amount, "CHF", "CHF", date(1900, 1, 1))
            .await
            .unwrap();

        assert_eq!(converted, amount);
        assert_eq!(converted.scale(), amount.scale());
        assert_eq!(service.repo().lookups().0, 0);
    }

    #[tokio::test]
    async fn test_triangular_conversion() {
        let service = triangle_service().await;
        let on = date(1999, 1, 4);

        let direct = service
            .convert_amount(dec!(100), "EUR", "AED", on)
            .await
            .unwrap();
        assert_eq!(direct, dec!(432.98775));

        let usd = service
            .convert_amount(dec!(100), "EUR", "USD", on)
            .await
            .unwrap();
        let stepwise = service.convert_amount(usd, "USD", "AED", on).await.unwrap();
        assert_eq!(direct, stepwise);
    }

    #[tokio::test]
    async fn test_reverse_pair_divides() {
        let service = triangle_service().await;

        let eur = service
            .convert_amount(dec!(117.90), "USD", "EUR", date(1999, 1, 4))
            .await
            .unwrap();

        assert_eq!(eur, dec!(100));
    }

    #[tokio::test]
    async fn test_round_trip_is_approximate_inverse() {
        let service = triangle_service().await;
        let on = date(1999, 1, 8);
        let amount = dec!(250);

        let aed = service
            .convert_amount(amount, "EUR", "AED", on)
            .await
            .unwrap();
        let back = service.convert_amount(aed, "AED", "EUR", on).await.unwrap();

        assert!((back - amount).abs() < dec!(0.0000000001));
    }

    #[tokio::test]
    async fn test_uses_latest_price_on_or_before_date() {
        let service = triangle_service().await;

        // 1999-01-07 falls in the gap, so the 1999-01-04 price applies.
        let gap = service
            .convert_amount(dec!(1), "EUR", "USD", date(1999, 1, 7))
            .await
            .unwrap();
        assert_eq!(gap, dec!(1.1790));

        let later = service
            .convert_amount(dec!(1), "EUR", "USD", date(2001, 1, 1))
            .await
            .unwrap();
        assert_eq!(later, dec!(1.1659));
    }

    #[tokio::test]
    async fn test_missing_price_before_first_date() {
        let service = triangle_service().await;

        let err = service
            .convert_amount(dec!(1), "EUR", "USD", date(1998, 12, 31))
            .await
            .unwrap_err();

        match err {
            ConversionError::NoPriceAvailable { base, quote, date: on } => {
                assert_eq!(base, "EUR");
                assert_eq!(quote, "USD");
                assert_eq!(on, date(1998, 12, 31));
            }
            other => panic!("expected NoPriceAvailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_forward_price_preferred_over_reverse() {
        let repo = MockRepo::with_rates(&["EUR", "USD"], &[("EUR", "USD"), ("USD", "EUR")]);
        // Deliberately inconsistent: the reverse pair alone would give 2.0.
        repo.add_price("EUR", "USD", date(2020, 1, 1), dec!(1.2));
        repo.add_price("USD", "EUR", date(2020, 1, 1), dec!(0.5));
        let service = ConversionService::new(repo, MockRateSource::new());
        service.rebuild_routing_table().await.unwrap();

        let usd = service
            .convert_amount(dec!(10), "EUR", "USD", date(2020, 1, 1))
            .await
            .unwrap();
        let eur = service
            .convert_amount(dec!(10), "USD", "EUR", date(2020, 1, 1))
            .await
            .unwrap();

        assert_eq!(usd, dec!(12));
        assert_eq!(eur, dec!(5));
    }

    #[tokio::test]
    async fn test_zero_price_is_an_error() {
        let repo = MockRepo::with_rates(&["EUR", "XZR"], &[("EUR", "XZR")]);
        repo.add_price("EUR", "XZR", date(2020, 1, 1), Decimal::ZERO);
        let service = ConversionService::new(repo, MockRateSource::new());
        service.rebuild_routing_table().await.unwrap();

        let err = service
            .convert_amount(dec!(10), "XZR", "EUR", date(2020, 1, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, ConversionError::Arithmetic { .. }));
    }

    #[tokio::test]
    async fn test_convert_many_batches_lookups() {
        let service = triangle_service().await;
        let on = date(1999, 1, 4);
        let request = |source: &str, target: &str| ConvertRequest {
            amount: dec!(100),
            source: source.into(),
            target: target.into(),
            date: Some(on),
        };
        let mut requests: Vec<_> = (0..5).map(|_| request("EUR", "AED")).collect();
        requests.push(request("EUR", "XXX"));

        let results = service.convert_many(&requests).await;

        assert_eq!(results.len(), 6);
        for result in &results[..5] {
            assert_eq!(result.as_ref().unwrap().amount, dec!(432.98775));
        }
        assert!(matches!(
            results[5],
            Err(ConversionError::UnknownCurrency(_))
        ));

        // One batch per hop, each holding the single distinct (rate, date).
        let (single, batches) = service.repo().lookups();
        assert_eq!(single, 0);
        assert_eq!(batches, vec![1, 1]);
    }

    #[tokio::test]
    async fn test_batch_lookup_keeps_repo_error_kind() {
        let service = triangle_service().await;
        service.repo().set_fail_lookups(|| RepoError::NotFound);
        let request = ConvertRequest {
            amount: dec!(1),
            source: "EUR".into(),
            target: "USD".into(),
            date: Some(date(1999, 1, 4)),
        };

        let results = service.convert_many(&[request]).await;

        assert!(matches!(
            results[0],
            Err(ConversionError::Repo(RepoError::NotFound))
        ));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Rebuild
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_table() {
        let service = triangle_service().await;
        service.repo().set_fail_reads(true);

        assert!(service.rebuild_routing_table().await.is_err());

        assert!(service.is_ready());
        assert_eq!(
            service.conversion_route("EUR", "AED").unwrap(),
            vec!["EUR", "USD", "AED"]
        );
    }

    #[tokio::test]
    async fn test_create_exchange_rate_republishes_routing() {
        let service = triangle_service().await;
        assert!(service.conversion_route("EUR", "CHF").is_err());

        service.create_exchange_rate("EUR", "CHF").await.unwrap();

        assert_eq!(
            service.conversion_route("AED", "CHF").unwrap(),
            vec!["AED", "USD", "EUR", "CHF"]
        );
    }

    #[tokio::test]
    async fn test_stale_rebuild_cannot_overwrite_newer_table() {
        let service = Arc::new(triangle_service().await);
        let gate = service.repo().hold_next_rate_read();

        // A background rebuild reads the rate list and stalls before publishing.
        let background = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.rebuild_routing_table().await })
        };
        gate.entered.notified().await;

        let create = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.create_exchange_rate("EUR", "CHF").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        gate.release.notify_one();
        background.await.unwrap().unwrap();
        create.await.unwrap().unwrap();

        assert_eq!(
            service.conversion_route("EUR", "CHF").unwrap(),
            vec!["EUR", "CHF"]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_never_see_mixed_snapshot() {
        let service = Arc::new(triangle_service().await);
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let service = Arc::clone(&service);
            let stop = Arc::clone(&stop);
            tokio::spawn(async move {
                for i in 0..200 {
                    if i % 2 == 0 {
                        service.repo().remove_rate("USD", "AED");
                    } else {
                        service.repo().add_rate("USD", "AED");
                    }
                    service.rebuild_routing_table().await.unwrap();
                }
                stop.store(true, Ordering::SeqCst);
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let service = Arc::clone(&service);
            let stop = Arc::clone(&stop);
            readers.push(tokio::spawn(async move {
                let mut observed = 0usize;
                while !stop.load(Ordering::SeqCst) {
                    let snapshot = service.current_snapshot().unwrap();
                    let has_edge = snapshot.rate_id("USD", "AED").is_some();
                    let routed = snapshot.table().route("EUR", "AED").is_ok();
                    assert_eq!(has_edge, routed);
                    observed += 1;
                    tokio::task::yield_now().await;
                }
                observed
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Refresh
    // ─────────────────────────────────────────────────────────────────────────────

    fn refresh_service() -> TestService {
        let repo = MockRepo::with_rates(
            &["EUR", "USD", "AED"],
            &[("EUR", "USD"), ("USD", "AED")],
        );
        let source = MockRateSource::new();
        source.set_series(
            "EUR",
            "USD",
            &[
                (date(1999, 1, 4), dec!(1.1789)),
                (date(1999, 1, 5), dec!(1.1790)),
            ],
        );
        ConversionService::new(repo, source)
    }

    #[tokio::test]
    async fn test_refresh_inserts_and_rebuilds() {
        let service = refresh_service();
        assert!(!service.is_ready());

        let summary = service.refresh_all_rates_on(date(1999, 1, 6)).await.unwrap();

        assert_eq!(summary.rates_checked, 2);
        assert_eq!(summary.rates_without_source, 1);
        assert_eq!(summary.rates_skipped_current, 0);
        assert_eq!(summary.prices_inserted, 2);
        assert!(service.is_ready());
        assert_eq!(
            service
                .convert_amount(dec!(1), "EUR", "USD", date(1999, 1, 6))
                .await
                .unwrap(),
            dec!(1.1790)
        );
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let service = refresh_service();
        let today = date(1999, 1, 6);

        service.refresh_all_rates_on(today).await.unwrap();
        let stored = service.repo().price_count();

        let second = service.refresh_all_rates_on(today).await.unwrap();

        assert_eq!(second.prices_inserted, 0);
        assert_eq!(service.repo().price_count(), stored);
    }

    #[tokio::test]
    async fn test_refresh_skips_rates_already_current() {
        let service = refresh_service();

        service.refresh_all_rates_on(date(1999, 1, 5)).await.unwrap();
        let calls_before = service.source().calls().len();
        let summary = service.refresh_all_rates_on(date(1999, 1, 5)).await.unwrap();

        assert_eq!(summary.rates_skipped_current, 1);
        assert_eq!(service.source().calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_refresh_only_appends_newer_points() {
        let service = refresh_service();
        let id = service.repo().rate_id("EUR", "USD");
        // An older stored value must not be overwritten by the feed.
        service
            .repo()
            .add_price("EUR", "USD", date(1999, 1, 4), dec!(9.9999));

        let summary = service.refresh_all_rates_on(date(1999, 1, 6)).await.unwrap();

        assert_eq!(summary.prices_inserted, 1);
        let stored = service
            .repo()
            .list_prices(id, None, None)
            .await
            .unwrap();
        assert_eq!(stored[0].value, dec!(9.9999));
        assert_eq!(stored[1].date, date(1999, 1, 5));
    }

    #[tokio::test]
    async fn test_refresh_fetch_failure_aborts_run() {
        let repo = MockRepo::with_rates(
            &["EUR", "USD", "GBP"],
            &[("EUR", "USD"), ("EUR", "GBP")],
        );
        let source = MockRateSource::new();
        source.fail("EUR", "USD");
        let service = ConversionService::new(repo, source);

        let err = service
            .refresh_all_rates_on(date(2024, 1, 2))
            .await
            .unwrap_err();

        assert!(matches!(err, RefreshError::Fetch(_)));
        // The second rate was never fetched and routing was not rebuilt.
        assert_eq!(service.source().calls().len(), 1);
        assert!(!service.is_ready());
    }

    #[tokio::test]
    async fn test_refresh_respects_reference_currency() {
        let repo = MockRepo::with_rates(&["EUR", "USD"], &[("EUR", "USD")]);
        let service =
            ConversionService::new(repo, MockRateSource::new()).with_reference_currency("usd");

        let summary = service.refresh_all_rates_on(date(2024, 1, 2)).await.unwrap();

        assert_eq!(summary.rates_without_source, 1);
        assert!(service.source().calls().is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Refresh job
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_refresh_cycle_survives_panic() {
        let service = Arc::new(refresh_service());
        service.source().panic_next.store(true, Ordering::SeqCst);
        let job = RefreshJob::new(Arc::clone(&service), RefreshSchedule::default());

        assert_eq!(job.run_cycle().await, CycleOutcome::Panicked);
        assert_eq!(job.run_cycle().await, CycleOutcome::Completed);
        assert!(service.is_ready());
    }

    #[tokio::test]
    async fn test_refresh_cycle_reports_fetch_failure() {
        let service = Arc::new(refresh_service());
        service.source().fail("EUR", "USD");
        let job = RefreshJob::new(service, RefreshSchedule::default());

        assert_eq!(job.run_cycle().await, CycleOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_job_schedule() {
        let service = Arc::new(refresh_service());
        let schedule = RefreshSchedule {
            initial_delay: Duration::from_secs(60),
            interval: Duration::from_secs(100),
        };
        let shutdown = CancellationToken::new();
        let handle = RefreshJob::new(Arc::clone(&service), schedule).spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(service.source().calls().is_empty());

        // Runs at t=60s and t=160s.
        tokio::time::sleep(Duration::from_secs(220)).await;
        assert_eq!(service.source().calls().len(), 2);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_job_cancelled_before_first_run() {
        let service = Arc::new(refresh_service());
        let shutdown = CancellationToken::new();
        let handle =
            RefreshJob::new(Arc::clone(&service), RefreshSchedule::default()).spawn(shutdown.clone());

        shutdown.cancel();
        handle.await.unwrap();

        assert!(service.source().calls().is_empty());
    }

    #[tokio::test]
    async fn test_list_prices_unknown_rate() {
        let service = triangle_service().await;

        let err = service
            .list_prices(ExchangeRateId::new(999), None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, folio_types::AppError::NotFound(_)));
    }
}
