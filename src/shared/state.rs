use crate::config::AppConfig;
use crate::payments::gateway::PaymentClient;
use crate::shared::utils::DbPool;
use aws_sdk_s3::Client as S3Client;
use lettre::SmtpTransport;

pub struct AppState {
    pub drive: Option<S3Client>,
    pub bucket_name: String,
    pub mailer: Option<SmtpTransport>,
    pub payments: PaymentClient,
    pub config: AppConfig,
    pub conn: DbPool,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            drive: self.drive.clone(),
            bucket_name: self.bucket_name.clone(),
            mailer: self.mailer.clone(),
            payments: self.payments.clone(),
            config: self.config.clone(),
            conn: self.conn.clone(),
        }
    }
}
