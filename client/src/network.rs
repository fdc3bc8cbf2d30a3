use crate::bot::{Bot, BotAction, BotConfig, BotReport};
use log::{debug, info};
use shared::framing::{read_packet, write_packet};
use shared::Packet;
use tokio::net::TcpStream;
use tokio::time::sleep;

pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// One bot connected to a game server.
pub struct Client {
    stream: TcpStream,
    bot: Bot,
}

impl Client {
    pub async fn connect(config: BotConfig) -> Result<Self, ClientError> {
        info!("Connecting to {}...", config.server);
        let stream = TcpStream::connect(&config.server).await?;
        stream.set_nodelay(true)?;

        Ok(Client {
            stream,
            bot: Bot::new(config),
        })
    }

    async fn send_packet(&mut self, packet: &Packet) -> Result<(), ClientError> {
        if matches!(packet, Packet::FinishedLink { .. }) {
            let think = self.bot.config().think;
            if !think.is_zero() {
                sleep(think).await;
            }
        }

        debug!("Sending {}", packet.name());
        write_packet(&mut self.stream, packet).await?;
        Ok(())
    }

    /// Plays until the bot is done or the server hangs up.
    pub async fn run(mut self) -> Result<BotReport, ClientError> {
        let opening = self.bot.opening_packet();
        self.send_packet(&opening).await?;

        loop {
            let Some(packet) = read_packet(&mut self.stream).await? else {
                info!("Server closed the connection");
                break;
            };
            debug!("Received {}", packet.name());

            match self.bot.handle(packet) {
                BotAction::Reply(reply) => self.send_packet(&reply).await?,
                BotAction::Idle => {}
                BotAction::Finished => {
                    // The server may already be gone; leaving is best effort.
                    let _ = self.send_packet(&Packet::Leave).await;
                    break;
                }
            }
        }

        Ok(self.bot.report())
    }
}
