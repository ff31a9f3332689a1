use crate::prelude::*;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// POSTs every sample as JSON. With a form field configured the JSON is
/// wrapped as a single url-encoded field instead, for endpoints that expect
/// form posts.
pub struct HttpPost {
    client: reqwest::Client,
    url: url::Url,
    field: Option<String>,
}

impl HttpPost {
    pub fn new(config: &config::Http) -> Result<Self> {
        let url = url::Url::parse(config.url())
            .map_err(|err| anyhow!("invalid http url {}: {}", config.url(), err))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        info!("posting samples to {}", url);

        Ok(Self {
            client,
            url,
            field: config.field().map(str::to_string),
        })
    }

    fn body(&self, sample: &Sample) -> Result<(String, &'static str)> {
        let json = serde_json::to_string(sample)?;

        Ok(match &self.field {
            Some(field) => (
                url::form_urlencoded::Serializer::new(String::new())
                    .append_pair(field, &json)
                    .finish(),
                "application/x-www-form-urlencoded",
            ),
            None => (json, "application/json"),
        })
    }
}

#[async_trait]
impl Sink for HttpPost {
    async fn deliver(&mut self, sample: &Sample) -> Result<()> {
        let (body, content_type) = self.body(sample)?;

        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            bail!("POST {} returned {}", self.url, status);
        }
        debug!("POST {} -> {}", self.url, status);

        Ok(())
    }
}
