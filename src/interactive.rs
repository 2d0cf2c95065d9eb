use crate::analysis::{AnalysisRequest, PatientContext};
use crate::data_url::detect_image_mime;
use crate::llm_client::LlmClient;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tracing::{debug, info};

const ACCEPTED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// An image the user picked, held for the rest of the session.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl UploadedImage {
    pub async fn load(path: &str) -> Result<Self, String> {
        let path = Path::new(path);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(format!(
                "Formato no admitido. Sube un archivo {}.",
                ACCEPTED_EXTENSIONS.join(", ")
            ));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| format!("No se pudo leer {}: {}", path.display(), e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = detect_image_mime(&bytes).to_string();

        Ok(Self { name, bytes, mime_type })
    }

    fn describe(&self) -> String {
        format!("{} ({} bytes, {})", self.name, self.bytes.len(), self.mime_type)
    }
}

/// Single-user terminal session: pick an image, optionally add patient data,
/// and trigger the analysis as many times as wanted.
pub struct InteractiveSession<'a> {
    client: &'a LlmClient,
    image: Option<UploadedImage>,
    patient: PatientContext,
}

impl<'a> InteractiveSession<'a> {
    pub fn new(client: &'a LlmClient) -> Self {
        Self { client, image: None, patient: PatientContext::default() }
    }

    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        say(output, "Analizador de ECG").await?;

        loop {
            if self.image.is_none() {
                say(output, "Ruta de la imagen del ECG (png, jpg, jpeg), o 's' para salir:").await?;
                let Some(line) = lines.next_line().await? else { break };
                match line.trim() {
                    "" => continue,
                    "s" => break,
                    path => self.upload(path, output).await?,
                }
                continue;
            }

            say(output, "[a] Analizar ECG  [p] Datos del paciente  [c] Cambiar imagen  [s] Salir").await?;
            let Some(line) = lines.next_line().await? else { break };
            match line.trim() {
                "a" => self.analyze(output).await?,
                "p" => {
                    if !self.ask_patient(&mut lines, output).await? {
                        break;
                    }
                }
                "c" => self.image = None,
                "s" => break,
                "" => {}
                other => say(output, &format!("Opción desconocida: {}", other)).await?,
            }
        }

        info!("Interactive session finished");
        Ok(())
    }

    async fn upload<W: AsyncWrite + Unpin>(&mut self, path: &str, output: &mut W) -> anyhow::Result<()> {
        match UploadedImage::load(path).await {
            Ok(image) => {
                debug!("Loaded {}", image.describe());
                say(output, &format!("Imagen cargada: {}", image.describe())).await?;
                self.image = Some(image);
            }
            Err(message) => say(output, &message).await?,
        }
        Ok(())
    }

    async fn analyze<W: AsyncWrite + Unpin>(&self, output: &mut W) -> anyhow::Result<()> {
        let Some(image) = &self.image else { return Ok(()) };
        say(output, "Analizando...").await?;

        let request = AnalysisRequest::new(image.bytes.clone(), image.mime_type.clone())
            .with_patient(Some(&self.patient));

        // Failures are shown in place of the result
        let text = match self.client.analyze(&request).await {
            Ok(result) => result.text,
            Err(e) => e.to_string(),
        };
        say(output, &format!("Resultado:\n{}", text)).await
    }

    /// Returns `false` when input ended mid-way.
    async fn ask_patient<R, W>(&mut self, lines: &mut Lines<R>, output: &mut W) -> anyhow::Result<bool>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut answers = Vec::with_capacity(3);
        for question in ["Edad:", "Género:", "Historial clínico:"] {
            say(output, question).await?;
            let Some(line) = lines.next_line().await? else { return Ok(false) };
            let answer = line.trim().to_string();
            answers.push(if answer.is_empty() { None } else { Some(answer) });
        }

        let mut answers = answers.into_iter();
        self.patient = PatientContext {
            edad: answers.next().flatten(),
            genero: answers.next().flatten(),
            historial: answers.next().flatten(),
        };
        say(output, "Datos del paciente guardados.").await?;
        Ok(true)
    }
}

async fn say<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> anyhow::Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
