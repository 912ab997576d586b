use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::{Mode, DEFAULT_DEVICE_PORT, DEFAULT_HOST_PORT};
use crate::session::SessionConfig;
use crate::transfer::TransferRequest;

#[derive(Parser, Debug)]
#[command(name = "espush")]
#[command(about = "Transmit an image over the air to an ESP module with OTA support", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Device IP address or hostname
    #[arg(long = "ip", short = 'i')]
    pub ip: String,

    /// Device OTA port
    #[arg(long, short = 'p', default_value_t = DEFAULT_DEVICE_PORT)]
    pub port: u16,

    /// Authentication password
    #[arg(long, short = 'a', env = "ESPUSH_PASSWORD", hide_env_values = true)]
    pub auth: Option<String>,

    /// Image file
    #[arg(long, short = 'f', value_name = "FILE")]
    pub file: PathBuf,

    /// Transmit a SPIFFS image and do not flash the module
    #[arg(long, short = 's')]
    pub spiffs: bool,

    /// Local address the device connects back to
    #[arg(long = "host-ip", short = 'I', default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host_ip: IpAddr,

    /// Local port announced to the device (0 picks a free one)
    #[arg(long = "host-port", short = 'P', default_value_t = DEFAULT_HOST_PORT)]
    pub host_port: u16,

    /// Wait for each reply, the connection and every chunk (e.g. "10s")
    #[arg(long, short = 't', default_value = "10s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Wait for the final result after the last chunk
    #[arg(long = "result-timeout", default_value = "60s", value_parser = humantime::parse_duration)]
    pub result_timeout: Duration,

    /// Show a progress bar while uploading
    #[arg(long, short = 'r')]
    pub progress: bool,

    /// Show debug output
    #[arg(long, short = 'd')]
    pub debug: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn mode(&self) -> Mode {
        if self.spiffs {
            Mode::FilesystemImage
        } else {
            Mode::FirmwareFlash
        }
    }

    pub fn request(&self) -> TransferRequest {
        TransferRequest {
            target_host: self.ip.clone(),
            target_port: self.port,
            password: self.auth.clone(),
            image: self.file.clone(),
            mode: self.mode(),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            listen_addr: SocketAddr::new(self.host_ip, self.host_port),
            reply_timeout: self.timeout,
            accept_timeout: self.timeout,
            chunk_timeout: self.timeout,
            result_timeout: self.result_timeout,
            show_progress: self.progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["espush", "-i", "192.168.4.1", "-f", "fw.bin"]).unwrap();
        assert_eq!(cli.mode(), Mode::FirmwareFlash);

        let request = cli.request();
        assert_eq!(request.target_port, 8266);
        assert_eq!(request.image, PathBuf::from("fw.bin"));

        let config = cli.session_config();
        assert_eq!(config.listen_addr, "0.0.0.0:48266".parse().unwrap());
        assert_eq!(config.reply_timeout, Duration::from_secs(10));
        assert_eq!(config.chunk_timeout, Duration::from_secs(10));
        assert_eq!(config.result_timeout, Duration::from_secs(60));
        assert!(!config.show_progress);
    }

    #[test]
    fn test_spiffs_and_overrides() {
        let cli = Cli::try_parse_from([
            "espush", "-i", "esp.local", "-p", "3232", "-a", "pw", "-s", "-f", "fs.bin", "-I",
            "10.0.0.2", "-P", "0", "-t", "2s", "--result-timeout", "2m", "-r",
        ])
        .unwrap();

        let request = cli.request();
        assert_eq!(request.mode, Mode::FilesystemImage);
        assert_eq!(request.target_host, "esp.local");
        assert_eq!(request.target_port, 3232);
        assert_eq!(request.password.as_deref(), Some("pw"));

        let config = cli.session_config();
        assert_eq!(config.listen_addr, "10.0.0.2:0".parse().unwrap());
        assert_eq!(config.accept_timeout, Duration::from_secs(2));
        assert_eq!(config.result_timeout, Duration::from_secs(120));
        assert!(config.show_progress);
    }

    #[test]
    fn test_ip_and_file_required() {
        assert!(Cli::try_parse_from(["espush", "-f", "fw.bin"]).is_err());
        assert!(Cli::try_parse_from(["espush", "-i", "192.168.4.1"]).is_err());
    }
}
