use super::guard::StopGuard;
use super::readiness::wait_until_healthy;
use super::shutdown::ShutdownCoordinator;
use super::signals::TerminationSource;
use super::{NetworkController, RunState, ShutdownReason};
use crate::error::{NetrunnerError, Result};
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info};

impl NetworkController {
    /// Run the network until SIGINT or SIGTERM
    pub async fn run(&mut self) -> Result<ShutdownReason> {
        self.run_with_source(TerminationSource::os_signals).await
    }

    /// Run the network until `register` yields a termination request.
    ///
    /// `register` is called only after the network has started, so a failed
    /// start never installs listeners.
    pub async fn run_with_source<F>(&mut self, register: F) -> Result<ShutdownReason>
    where
        F: FnOnce() -> Result<TerminationSource>,
    {
        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| NetrunnerError::system("Shutdown sender already taken"))?;
        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| NetrunnerError::system("Shutdown receiver already taken"))?;

        self.start_network().await?;

        let guard = StopGuard::new(
            Arc::clone(&self.network),
            self.config.lifecycle.stop_timeout(),
        );
        let result = self
            .supervise(register, shutdown_sender, shutdown_receiver)
            .await;
        guard.release().await;

        match &result {
            Ok(reason) => {
                self.state.set(RunState::Stopped);
                info!("Network shut down after {}", reason);
            }
            Err(e) => {
                self.state.set(RunState::Failed);
                error!("Network run failed: {}", e);
            }
        }

        result
    }

    async fn supervise<F>(
        &self,
        register: F,
        shutdown_sender: oneshot::Sender<ShutdownReason>,
        shutdown_receiver: oneshot::Receiver<ShutdownReason>,
    ) -> Result<ShutdownReason>
    where
        F: FnOnce() -> Result<TerminationSource>,
    {
        let source = register()?;
        let coordinator = ShutdownCoordinator::new(
            Arc::clone(&self.network),
            self.config.lifecycle.stop_timeout(),
            self.state.clone(),
        )
        .spawn(source, shutdown_sender);

        let result = self.await_shutdown(shutdown_receiver).await;
        coordinator.finish().await;
        result
    }

    /// Bounded health wait, then block until the coordinator reports.
    ///
    /// A shutdown that completes during the health wait ends the run right
    /// away with its reason; the abandoned health check is cancelled.
    async fn await_shutdown(
        &self,
        mut shutdown_receiver: oneshot::Receiver<ShutdownReason>,
    ) -> Result<ShutdownReason> {
        let deadline = self.config.lifecycle.healthy_timeout();
        self.state.set(RunState::AwaitingHealth);
        info!("Waiting up to {:?} for all nodes to report healthy...", deadline);

        let mut readiness = pin!(wait_until_healthy(self.network.as_ref(), deadline));
        let early = tokio::select! {
            biased;
            received = &mut shutdown_receiver => Some(received),
            outcome = &mut readiness => {
                outcome.into_result()?;
                None
            }
        };

        match early {
            Some(Ok(reason)) => {
                info!("Shutdown completed before the network became healthy");
                return Ok(reason);
            }
            Some(Err(_)) => {
                readiness.await.into_result()?;
                return Err(channel_closed());
            }
            None => {}
        }

        self.state.set(RunState::Running);
        info!("All nodes healthy. Network will run until you CTRL + C to exit...");

        shutdown_receiver.await.map_err(|_| channel_closed())
    }
}

fn channel_closed() -> NetrunnerError {
    NetrunnerError::system("Shutdown channel closed unexpectedly")
}
