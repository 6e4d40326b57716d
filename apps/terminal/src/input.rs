use client_core::{SessionError, SessionHandle};

/// Marks the local user as typing, then sends `text`. Sending clears the
/// typing state again, so peers see one short indicator per line.
pub async fn submit_line(handle: &SessionHandle, text: &str) -> Result<(), SessionError> {
    handle.keystroke().await?;
    handle.send_message(text).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_core::{
        spawn_session, ClientSettings, SessionEvent, SessionStatus, Transport, TransportError,
        TransportEventKind, TransportLink,
    };
    use shared::protocol::{ClientRequest, JoinResult, ServerEvent};
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };
    use tokio::{sync::broadcast, time::timeout};

    #[derive(Clone, Default)]
    struct Recorder {
        link: Arc<Mutex<Option<TransportLink>>>,
        sent: Arc<Mutex<Vec<ClientRequest>>>,
    }

    impl Recorder {
        fn emit(&self, kind: TransportEventKind) {
            let link = self.link.lock().expect("link").clone().expect("opened");
            link.emit(kind);
        }

        fn sent(&self) -> Vec<ClientRequest> {
            self.sent.lock().expect("sent").clone()
        }
    }

    impl Transport for Recorder {
        fn open(&mut self, link: TransportLink) {
            *self.link.lock().expect("link") = Some(link);
        }

        fn send(&mut self, request: &ClientRequest) -> Result<(), TransportError> {
            self.sent.lock().expect("sent").push(request.clone());
            Ok(())
        }

        fn close(&mut self) {}
    }

    async fn wait_for(events: &mut broadcast::Receiver<SessionEvent>, status: SessionStatus) {
        timeout(Duration::from_secs(5), async {
            loop {
                if let SessionEvent::Changed(snapshot) = events.recv().await.expect("events") {
                    if snapshot.status == status {
                        return;
                    }
                }
            }
        })
        .await
        .expect("timed out waiting for status");
    }

    async fn connected() -> (SessionHandle, Recorder, broadcast::Receiver<SessionEvent>) {
        let recorder = Recorder::default();
        let (handle, _task) = spawn_session(&ClientSettings::default(), Box::new(recorder.clone()));
        let mut events = handle.subscribe();
        handle.connect().await.expect("connect");
        recorder.emit(TransportEventKind::Connected);
        wait_for(&mut events, SessionStatus::Connected).await;
        (handle, recorder, events)
    }

    #[tokio::test]
    async fn line_goes_out_as_typing_then_message() {
        let (handle, recorder, mut events) = connected().await;
        handle.join("alice").await.expect("join");
        recorder.emit(TransportEventKind::Event(ServerEvent::Join(JoinResult {
            success: true,
            message: "Welcome alice".into(),
        })));
        wait_for(&mut events, SessionStatus::Joined).await;

        submit_line(&handle, "hello").await.expect("submit");
        assert_eq!(
            recorder.sent(),
            vec![
                ClientRequest::Join("alice".into()),
                ClientRequest::Typing { is_typing: true },
                ClientRequest::Typing { is_typing: false },
                ClientRequest::ChatMessage {
                    message: "hello".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn line_before_joining_fails_locally() {
        let (handle, recorder, _events) = connected().await;
        let err = submit_line(&handle, "hello").await.expect_err("not joined");
        assert_eq!(err, SessionError::NotJoined);
        assert!(err.is_local());
        assert!(recorder.sent().is_empty());
    }
}
