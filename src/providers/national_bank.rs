use crate::core::error::FetchError;
use crate::core::rate::{RateMap, SiteRateObservation, is_valid_rate, normalize_code};
use crate::core::source::ReferenceRateSource;
use crate::providers::util::{http_client, with_retry};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, instrument};

const SOURCE: &str = "national-bank";
const DATE_FORMAT: &str = "%d.%m.%Y";

/// Official rates scraped from the national bank's daily report table.
///
/// The report lists one currency per page; `currency_code` names it.
pub struct NationalBankProvider {
    report_url: String,
    window_days: i64,
    currency_code: String,
    client: reqwest::Client,
}

impl NationalBankProvider {
    pub fn new(
        report_url: &str,
        window_days: i64,
        currency_code: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(NationalBankProvider {
            report_url: report_url.to_string(),
            window_days,
            currency_code: normalize_code(currency_code),
            client: http_client(timeout)?,
        })
    }
}

/// Fills the `{begin_date}`/`{end_date}` placeholders of a report URL.
pub fn report_url_for(template: &str, today: NaiveDate, window_days: i64) -> String {
    let begin = today - ChronoDuration::days(window_days.max(0));
    template
        .replace("{begin_date}", &begin.format(DATE_FORMAT).to_string())
        .replace("{end_date}", &today.format(DATE_FORMAT).to_string())
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::parse(SOURCE, format!("bad selector {css}: {e:?}")))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().map(str::trim).collect::<Vec<_>>().join("")
}

/// Parses a decimal-comma number such as `538,45` or `1 538,45`.
pub fn parse_decimal_comma(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    cleaned.parse().ok()
}

/// Extracts the rate from the first data row of `<table class="table">`.
pub fn parse_report_table(
    html: &str,
    currency_code: &str,
) -> Result<SiteRateObservation, FetchError> {
    let document = Html::parse_document(html);
    let table_sel = selector("table.table")?;
    let header_sel = selector("thead th")?;
    let row_sel = selector("tbody tr")?;
    let cell_sel = selector("td")?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| FetchError::parse(SOURCE, "rates table not found"))?;

    let headers: Vec<String> = table.select(&header_sel).map(cell_text).collect();
    let column = headers.get(2).map(String::as_str).unwrap_or("UNKNOWN");
    debug!("Report column: {}", column);

    let first_row = table
        .select(&row_sel)
        .next()
        .ok_or_else(|| FetchError::empty(SOURCE))?;
    let cells: Vec<String> = first_row.select(&cell_sel).map(cell_text).collect();
    let rate_text = cells
        .get(2)
        .ok_or_else(|| FetchError::parse(SOURCE, "first row has fewer than 3 cells"))?;

    let rate = parse_decimal_comma(rate_text)
        .ok_or_else(|| FetchError::parse(SOURCE, format!("could not parse rate value: {rate_text}")))?;
    if !is_valid_rate(rate) {
        return Err(FetchError::parse(
            SOURCE,
            format!("rate must be positive, got {rate_text}"),
        ));
    }

    Ok(SiteRateObservation {
        currency_code: normalize_code(currency_code),
        rate,
    })
}

#[async_trait]
impl ReferenceRateSource for NationalBankProvider {
    #[instrument(name = "NationalBankFetch", skip(self), fields(currency = %self.currency_code))]
    async fn fetch_reference_rates(&self) -> Result<RateMap, FetchError> {
        let url = report_url_for(&self.report_url, Utc::now().date_naive(), self.window_days);
        debug!("Requesting report page from {}", url);

        let response = with_retry(|| async { self.client.get(&url).send().await }, 2, 500)
            .await
            .map_err(|e| FetchError::request(SOURCE, e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                source_name: SOURCE.to_string(),
                status: response.status().as_u16(),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::request(SOURCE, e))?;
        let observation = parse_report_table(&html, &self.currency_code)?;
        debug!("Parsed site rate {:?}", observation);

        Ok(RateMap::from([(observation.currency_code, observation.rate)]))
    }
}
