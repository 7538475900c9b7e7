use hlsget::{resolve, HlsError, HttpClient};
use tokio_util::sync::CancellationToken;

use crate::hls::{setup_mock_server, HlsMock};

#[tokio::test]
async fn media_playlist_resolves_to_itself() -> anyhow::Result<()> {
    let (uri, _server) = setup_mock_server(
        "#EXTM3U
#EXT-X-TARGETDURATION:10
#EXTINF:9.009,
first.ts
#EXTINF:9.009,
second.ts
#EXT-X-ENDLIST",
    )
    .await;

    let client = HttpClient::default();
    let (playlist_url, playlist) = resolve(&client, uri.parse()?, 1080, &CancellationToken::new()).await?;

    assert_eq!(playlist_url.as_str(), uri);
    assert_eq!(playlist.segments.len(), 2);
    assert_eq!(playlist.segments[0].url, "first.ts");
    assert!(!playlist.is_live);

    Ok(())
}

#[tokio::test]
async fn master_playlist_selects_preferred_quality() -> anyhow::Result<()> {
    let (uri, server) = setup_mock_server(
        "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=854x480
media/480.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=1400000,RESOLUTION=1280x720
media/720.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1920x1080
media/1080.m3u8",
    )
    .await;

    let media = "#EXTM3U\n#EXTINF:4.0,\nseg1.ts\n#EXT-X-ENDLIST";
    server
        .mock("/media/480.m3u8", media)
        .await
        .mock("/media/720.m3u8", media)
        .await
        .mock("/media/1080.m3u8", media)
        .await;

    let client = HttpClient::default();
    let (playlist_url, playlist) = resolve(&client, uri.parse()?, 720, &CancellationToken::new()).await?;

    assert_eq!(
        playlist_url.as_str(),
        format!("{}/media/720.m3u8", server.uri())
    );
    assert_eq!(playlist.segments.len(), 1);

    Ok(())
}

#[tokio::test]
async fn quality_ceiling_miss_falls_back_to_first_candidate() -> anyhow::Result<()> {
    let (uri, server) = setup_mock_server(
        "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=1400000,RESOLUTION=1280x720
720.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=854x480
480.m3u8",
    )
    .await;

    let media = "#EXTM3U\n#EXTINF:4.0,\nseg1.ts\n#EXT-X-ENDLIST";
    server
        .mock("/720.m3u8", media)
        .await
        .mock("/480.m3u8", media)
        .await;

    let client = HttpClient::default();
    let (playlist_url, _playlist) = resolve(&client, uri.parse()?, 200, &CancellationToken::new()).await?;

    // Nothing fits under the ceiling, so the first candidate in encounter
    // order wins.
    assert_eq!(playlist_url.as_str(), format!("{}/720.m3u8", server.uri()));

    Ok(())
}

#[tokio::test]
async fn nested_master_resolves_relative_to_its_own_location() -> anyhow::Result<()> {
    let (uri, server) = setup_mock_server(
        "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=1400000
nested/master.m3u8",
    )
    .await;

    server
        .mock(
            "/nested/master.m3u8",
            "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=1400000,RESOLUTION=1280x720
720.m3u8",
        )
        .await
        .mock("/nested/720.m3u8", "#EXTM3U\n#EXTINF:4.0,\nseg1.ts\n#EXT-X-ENDLIST")
        .await;

    let client = HttpClient::default();
    let (playlist_url, playlist) = resolve(&client, uri.parse()?, 1080, &CancellationToken::new()).await?;

    // The nested variant resolved against nested/, not against the root.
    assert_eq!(
        playlist_url.as_str(),
        format!("{}/nested/720.m3u8", server.uri())
    );
    assert_eq!(playlist.segments.len(), 1);

    Ok(())
}

#[tokio::test]
async fn canceled_token_stops_playlist_resolution() -> anyhow::Result<()> {
    let (uri, _server) = setup_mock_server(
        "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=1400000,RESOLUTION=1280x720
720.m3u8",
    )
    .await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let client = HttpClient::default();
    let result = resolve(&client, uri.parse()?, 1080, &cancel).await;

    assert!(matches!(result, Err(HlsError::Canceled)));

    Ok(())
}

#[tokio::test]
async fn empty_playlist_is_rejected() -> anyhow::Result<()> {
    let (uri, _server) = setup_mock_server("#EXTM3U\n#EXT-X-ENDLIST").await;

    let client = HttpClient::default();
    let result = resolve(&client, uri.parse()?, 1080, &CancellationToken::new()).await;

    assert!(matches!(result, Err(HlsError::NoSegments)));

    Ok(())
}
